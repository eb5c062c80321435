use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    // Copy runtime config and icons next to the executable
    copy_icons();
    copy_file("config.json");
    copy_file("keybindings.json");
}

/// Returns target/<profile>, derived from OUT_DIR.
fn target_dir() -> Option<PathBuf> {
    let out_dir = env::var("OUT_DIR").ok()?;
    // OUT_DIR is something like target/release/build/rotation-assist-xxx/out
    Path::new(&out_dir).ancestors().nth(3).map(Path::to_path_buf)
}

/// Copies the icons folder so the executable can find ability templates.
fn copy_icons() {
    let Some(target_dir) = target_dir() else {
        return;
    };

    let icons_src = Path::new("icons");
    if icons_src.exists() {
        copy_dir_recursive(icons_src, &target_dir.join("icons"));
        println!("cargo:rerun-if-changed=icons/");
    }
}

/// Recursively copies a directory and its contents.
fn copy_dir_recursive(src: &Path, dst: &Path) {
    let _ = fs::create_dir_all(dst);

    if let Ok(entries) = fs::read_dir(src) {
        for entry in entries.flatten() {
            let src_path = entry.path();
            let Some(file_name) = src_path.file_name() else {
                continue;
            };
            let dst_path = dst.join(file_name);

            if src_path.is_dir() {
                copy_dir_recursive(&src_path, &dst_path);
            } else {
                let _ = fs::copy(&src_path, &dst_path);
            }
        }
    }
}

/// Copies a single top-level file to the target directory.
fn copy_file(name: &str) {
    let Some(target_dir) = target_dir() else {
        return;
    };

    let src = Path::new(name);
    if src.exists() {
        let _ = fs::copy(src, target_dir.join(name));
        println!("cargo:rerun-if-changed={}", name);
    }
}
