//! `devsite clean`

use anyhow::Result;
use devsite::clean::clean_builds;
use devsite::ui::DeployUI;
use std::path::Path;

use super::project_layout;

pub fn cmd_clean(directory: &Path, keep: usize, verbose: bool) -> Result<()> {
    let ui = DeployUI::new(verbose);
    let layout = project_layout(directory)?;
    let builds_dir = layout.builds_dir();

    ui.step(format!("Deleting old builds in {}", builds_dir.display()));
    let report = clean_builds(&builds_dir, keep)?;
    for path in &report.removed {
        ui.detail(format!("removed {}", path.display()));
    }
    ui.success(format!(
        "Removed {} build(s), kept {}",
        report.removed.len(),
        report.kept.len()
    ));
    Ok(())
}
