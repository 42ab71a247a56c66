//! Status markers shared by the terminal UI.

use console::Emoji;

pub static STEP: Emoji<'_, '_> = Emoji("🔹 ", "[*] ");
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[ok] ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[error] ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
pub static LINK: Emoji<'_, '_> = Emoji("🔗 ", "-> ");
