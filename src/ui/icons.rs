//! Emoji with plain-text fallbacks for terminals that cannot render them.

use console::Emoji;

pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR] ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN] ");
pub static WRENCH: Emoji<'_, '_> = Emoji("🔧 ", "");
pub static LOCK: Emoji<'_, '_> = Emoji("🔒 ", "");
pub static TEST: Emoji<'_, '_> = Emoji("🧪 ", "");
pub static PLANT: Emoji<'_, '_> = Emoji("🌱 ", "");
pub static BRANCH: Emoji<'_, '_> = Emoji("🌿 ", "");
pub static FILE: Emoji<'_, '_> = Emoji("📄 ", "-");
