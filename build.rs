use std::collections::BTreeMap;
use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

const DEFAULT_LOCALE: &str = "en-US";

fn main() {
    let locales_dir = Path::new("locales");
    println!("cargo:rerun-if-changed={}", locales_dir.display());

    let mut locales = BTreeMap::<String, BTreeMap<String, String>>::new();
    if let Ok(entries) = fs::read_dir(locales_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
                continue;
            }
            let Some(locale) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            println!("cargo:rerun-if-changed={}", path.display());
            let source = fs::read_to_string(&path)
                .unwrap_or_else(|error| panic!("reading {}: {error}", path.display()));
            let table = source
                .parse::<toml::Table>()
                .unwrap_or_else(|error| panic!("parsing {}: {error}", path.display()));
            let mut messages = BTreeMap::new();
            flatten("", &table, &mut messages);
            locales.insert(locale.to_string(), messages);
        }
    }

    let mut generated = String::new();
    writeln!(generated, "pub const DEFAULT_LOCALE: &str = {DEFAULT_LOCALE:?};").ok();
    writeln!(generated, "pub static LOCALES: &[(&str, &[(&str, &str)])] = &[").ok();
    for (locale, messages) in &locales {
        writeln!(generated, "    ({locale:?}, &[").ok();
        for (key, message) in messages {
            writeln!(generated, "        ({key:?}, {message:?}),").ok();
        }
        writeln!(generated, "    ]),").ok();
    }
    writeln!(generated, "];").ok();

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    fs::write(
        Path::new(&out_dir).join("bizform_i18n_generated.rs"),
        generated,
    )
    .expect("writing generated i18n catalog");
}

fn flatten(prefix: &str, table: &toml::Table, out: &mut BTreeMap<String, String>) {
    for (key, value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::String(message) => {
                out.insert(path, message.clone());
            }
            toml::Value::Table(nested) => flatten(&path, nested, out),
            other => panic!("locale entry {path} must be a string, found {other}"),
        }
    }
}
