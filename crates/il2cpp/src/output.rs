//! Output generators for scan results

use crate::classes::body_line_count;
use crate::dump::DumpFile;
use crate::obfuscation::is_obfuscated;
use dumpcs_core::{ClassInfo, MethodRecord, Result, ScanReport};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

/// JSON script output format (compatible with IDA/Ghidra scripts)
#[derive(Debug, Serialize)]
pub struct ScriptJson {
    #[serde(rename = "ScriptMethod")]
    pub methods: Vec<ScriptMethod>,
    #[serde(rename = "Addresses")]
    pub addresses: Vec<u64>,
}

#[derive(Debug, Serialize)]
pub struct ScriptMethod {
    #[serde(rename = "Address")]
    pub address: u64,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Signature")]
    pub signature: String,
    #[serde(rename = "TypeSignature")]
    pub type_signature: String,
}

impl ScriptJson {
    /// Collect every method declared inside a class
    pub fn from_dump(dump: &DumpFile) -> Self {
        let methods: Vec<ScriptMethod> = dump
            .class_infos()
            .flat_map(|info| {
                let class_name = info.class.name;
                info.methods
                    .into_iter()
                    .map(move |m| Self::script_method(&class_name, &m))
            })
            .collect();

        let mut addresses: Vec<u64> = methods.iter().map(|m| m.address).collect();
        addresses.sort_unstable();
        addresses.dedup();

        Self { methods, addresses }
    }

    fn script_method(class_name: &str, method: &MethodRecord) -> ScriptMethod {
        let full_name = format!("{}$${}", class_name, method.name);
        ScriptMethod {
            address: u64::from(method.offset.as_u32()),
            signature: format!("{} {}({})", method.return_type, full_name, method.params),
            name: full_name,
            type_signature: method.return_type.clone(),
        }
    }

    /// Write to JSON file
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| dumpcs_core::Error::parse(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Plain-text class listing
pub struct ClassListing;

impl ClassListing {
    /// One block per class with its fields and methods
    pub fn generate(dump: &DumpFile) -> String {
        let mut output = String::new();

        output.push_str("// Generated by dumpcs\n");
        if let Some(path) = dump.path() {
            let _ = writeln!(output, "// Source: {}", path.display());
        }
        output.push('\n');

        for info in dump.class_infos() {
            output.push_str(&Self::generate_class(&info));
            output.push('\n');
        }

        output
    }

    fn generate_class(info: &ClassInfo) -> String {
        let mut output = String::new();
        let class = &info.class;

        let _ = writeln!(
            output,
            "{}{}  ({} lines)",
            class.declaration_text,
            Self::flag(&class.name),
            body_line_count(class)
        );

        for field in &info.fields {
            let _ = writeln!(
                output,
                "    field   {}{}",
                field.declaration(),
                Self::flag(&field.name)
            );
        }

        for method in &info.methods {
            let modifiers = method.modifiers_text();
            let _ = writeln!(
                output,
                "    method  {}  {}{}{}",
                method.offset,
                if modifiers.is_empty() { String::new() } else { format!("{} ", modifiers) },
                method.signature(),
                Self::flag(&method.name)
            );
        }

        output
    }

    fn flag(name: &str) -> &'static str {
        if is_obfuscated(name) {
            "  [obfuscated]"
        } else {
            ""
        }
    }

    /// Write listing to file
    pub fn write_to_file(dump: &DumpFile, path: &Path) -> Result<()> {
        let content = Self::generate(dump);
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Write a scan report as pretty JSON
pub fn write_report(report: &ScanReport, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(report)
        .map_err(|e| dumpcs_core::Error::parse(e.to_string()))?;
    std::fs::write(path, content)?;
    Ok(())
}
