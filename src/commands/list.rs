//! List command implementation

use crate::backends::available_backends;

/// List all compiled-in backends
pub fn list_backends() {
    let backends = available_backends();

    if backends.is_empty() {
        println!("No backends available (recompile with backend features enabled)");
        return;
    }

    println!("Available backends:");
    println!();
    for b in &backends {
        println!("  {:12} - {}", b.name, b.description);
        if !b.aliases.is_empty() {
            println!("  {:12}   aliases: {}", "", b.aliases.join(", "));
        }
    }
}
