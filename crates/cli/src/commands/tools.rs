//! `flowsmith tools`: list the tools agents can be given.

use flowsmith_core::tool::Tool;

pub fn run() {
    let registry = flowsmith_tools::default_registry();
    println!("🔧 Registered tools");
    println!("===================");
    for name in registry.names() {
        let Some(tool) = registry.lookup(name) else {
            continue;
        };
        println!();
        println!("  {name}");
        println!("    {}", tool.description());
        for param in tool.parameters() {
            let required = if param.required { "required" } else { "optional" };
            println!("    - {} ({}, {required}): {}", param.name, param.param_type, param.description);
        }
    }
}
