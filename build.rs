// Build script to compile GLSL shaders to SPIR-V
//
// Output lands in OUT_DIR and is embedded with include_bytes!. When glslc is not
// installed the build still succeeds with empty blobs; the renderer then refuses
// to initialize unless `renderer.shader_dir` points at prebuilt SPIR-V.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADERS: &[&str] = &["legacy.vert", "legacy.frag"];

fn main() {
    println!("cargo:rerun-if-changed=shaders/");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));

    for shader in SHADERS {
        let input = Path::new("shaders").join(shader);
        let output = out_dir.join(format!("{shader}.spv"));
        compile_shader(&input, &output);
    }
}

fn compile_shader(input: &Path, output: &Path) {
    let result = Command::new("glslc")
        .arg("--target-env=vulkan1.0")
        .arg(input)
        .arg("-o")
        .arg(output)
        .status();

    match result {
        Ok(status) if status.success() => {}
        Ok(status) => {
            panic!("Failed to compile {}: exit code {:?}", input.display(), status.code());
        }
        Err(e) => {
            println!(
                "cargo:warning=glslc not found ({e}); {} embedded empty. Install the Vulkan SDK or set renderer.shader_dir",
                input.display()
            );
            fs::write(output, []).expect("write placeholder shader");
        }
    }
}
