use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Every `REPOSTATS_*` token mentioned under `src/`. `status` uses the list
/// to flag environment variables nothing reads.
fn env_names_in(root: &Path) -> std::io::Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            if path.extension().is_none_or(|ext| ext != "rs") {
                continue;
            }
            let source = fs::read_to_string(&path)?;
            let tokens = source.split(|c: char| !(c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'));
            names.extend(
                tokens
                    .filter_map(|token| token.find("REPOSTATS_").map(|at| &token[at..]))
                    .filter(|name| name.len() > "REPOSTATS_".len())
                    .map(str::to_string),
            );
        }
    }
    Ok(names)
}

fn main() {
    let names = env_names_in(Path::new("src")).expect("scan src for REPOSTATS_ names");
    let body: String = names.iter().map(|name| format!("    \"{name}\",\n")).collect();
    let generated = format!("pub const GENERATED_REPOSTATS_ENV_ALLOWLIST: &[&str] = &[\n{body}];\n");

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    fs::write(Path::new(&out_dir).join("repostats_env_allowlist.rs"), generated)
        .expect("write env allowlist");

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src");
}
