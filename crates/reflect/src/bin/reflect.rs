//! Shader reflection tool
//!
//! This binary reflects one entry point of a WGSL file and prints the result
//! as JSON: the bindings the entry point uses, its vertex inputs, its color
//! outputs and its workgroup size.

use pipegpu_reflect::ShaderReflection;
use std::env;
use std::fs;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() != 3 {
        eprintln!("Usage: {} <shader.wgsl> <entry_point>", args[0]);
        eprintln!("Reflects a WGSL entry point and dumps the result to stdout as JSON");
        process::exit(1);
    }

    let shader_path = &args[1];
    let entry_point = &args[2];

    if !Path::new(shader_path).exists() {
        eprintln!("Error: Shader file '{shader_path}' does not exist");
        process::exit(1);
    }

    let source = match fs::read_to_string(shader_path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading '{shader_path}': {e}");
            process::exit(1);
        }
    };

    match ShaderReflection::from_wgsl(&source, entry_point) {
        Ok(reflection) => match serde_json::to_string_pretty(&reflection) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing reflection: {e}");
                process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("Error reflecting '{entry_point}' in '{shader_path}': {e}");
            process::exit(1);
        }
    }
}
