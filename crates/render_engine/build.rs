// build.rs
// Compiles the GLSL shaders under resources/shaders into SPIR-V.
// Skips silently when the Vulkan SDK is not installed so that pure
// library builds and tests work on machines without a GPU toolchain.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=../../resources/shaders");

    let skip_shaders =
        env::var("SKIP_SHADERS").is_ok() || env::args().any(|arg| arg == "--skip-shaders");
    if skip_shaders {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set or --skip-shaders arg)");
        return;
    }

    let vulkan_sdk = match env::var("VULKAN_SDK") {
        Ok(sdk) => sdk,
        Err(_) => {
            println!("cargo:rerun-if-env-changed=VULKAN_SDK");
            eprintln!("warning: VULKAN_SDK not set, shader compilation skipped");
            eprintln!("hint: Install the Vulkan SDK or run scripts/compile_shaders.sh manually");
            return;
        }
    };

    let glslc = if cfg!(target_os = "windows") {
        format!("{}\\Bin\\glslc.exe", vulkan_sdk)
    } else {
        format!("{}/bin/glslc", vulkan_sdk)
    };

    if !Path::new(&glslc).exists() {
        eprintln!("warning: glslc not found at {}, shader compilation skipped", glslc);
        return;
    }

    let shader_dir = PathBuf::from("../../resources/shaders");
    let target_dir = PathBuf::from("../../target/shaders");

    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        eprintln!("warning: Failed to create shader output directory: {}", e);
        return;
    }

    let shader_files = match std::fs::read_dir(&shader_dir) {
        Ok(files) => files,
        Err(_) => {
            eprintln!("info: No shader directory found at: {:?}", shader_dir);
            return;
        }
    };

    let mut compiled_count = 0;
    for entry in shader_files {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                eprintln!("warning: Error reading shader directory entry: {}", e);
                continue;
            }
        };

        let path = entry.path();
        if let Some(ext) = path.extension() {
            if ext == "vert" || ext == "frag" {
                let out_file = target_dir
                    .join(path.file_name().unwrap())
                    .with_extension(format!("{}.spv", ext.to_string_lossy()));

                let needs_compile = if let (Ok(src_meta), Ok(dst_meta)) =
                    (std::fs::metadata(&path), std::fs::metadata(&out_file))
                {
                    src_meta.modified().unwrap() > dst_meta.modified().unwrap()
                } else {
                    true
                };

                if needs_compile {
                    let status = Command::new(&glslc).arg(&path).arg("-o").arg(&out_file).status();

                    match status {
                        Ok(s) if s.success() => {
                            eprintln!("info: Compiled {:?}", path.file_name().unwrap());
                            compiled_count += 1;
                        }
                        Ok(s) => {
                            eprintln!(
                                "error: glslc failed for {:?} with exit code: {}",
                                path,
                                s.code().unwrap_or(-1)
                            );
                            panic!("Shader compilation failed");
                        }
                        Err(e) => {
                            eprintln!("error: Failed to run glslc for {:?}: {}", path, e);
                            panic!("Failed to execute shader compiler");
                        }
                    }
                }
            }
        }
    }

    if compiled_count > 0 {
        eprintln!("info: Compiled {} shader(s)", compiled_count);
    }
}
