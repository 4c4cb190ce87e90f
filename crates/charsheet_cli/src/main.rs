//! CLI smoke entry point.
//!
//! Verifies `charsheet_core` linkage and prints the default budget table,
//! without any Flutter/FFI runtime.

use charsheet_core::{BudgetCaps, BudgetEnforcer, Document, FormSchema};

fn main() {
    println!("charsheet_core ping={}", charsheet_core::ping());
    println!("charsheet_core version={}", charsheet_core::core_version());

    let schema = FormSchema::standard();
    let enforcer = BudgetEnforcer::new(BudgetCaps::default());
    let defaults = Document::default_for(&schema);
    for def in &schema.groups {
        let Some(values) = defaults.group(def.id) else {
            continue;
        };
        println!(
            "group={} stats={} remaining={}",
            def.id.key(),
            def.stats.len(),
            enforcer.budget(def, values).display()
        );
    }
}
