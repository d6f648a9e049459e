#![no_main]

use libfuzzer_sys::fuzz_target;

use was::parser;
use was::runtime::{EngineConfig, Instance, Value};

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    let module = match parser::parse(source) {
        Ok(m) => m,
        Err(_) => return,
    };

    let config = EngineConfig::default()
        .with_max_call_depth(Some(64))
        .with_instruction_budget(Some(100_000));
    let mut instance = match Instance::new(&module, config) {
        Ok(instance) => instance,
        Err(_) => return,
    };

    // Invoke every exported function with zeroed arguments of the right types
    let exports: Vec<String> = instance.exported_functions().into_iter().map(String::from).collect();
    for name in &exports {
        let args: Vec<Value> = match module.exported_function(name) {
            Some(function) => function.params.iter().map(|p| p.ty.zero()).collect(),
            None => continue,
        };
        let _ = instance.invoke(name, args);
    }
});
