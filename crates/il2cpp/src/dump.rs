//! Loaded dump.cs document and the queries over it

use crate::classes::{self, ClassScanner};
use crate::index::OffsetIndex;
use crate::members::{FieldScanner, MethodScanner};
use crate::obfuscation::is_obfuscated;
use chrono::Utc;
use dumpcs_core::{
    ClassInfo, ClassRecord, Config, EventBus, MemberKind, MethodRecord, ObfuscatedMember, Result,
    Rva, ScanEvent, ScanReport, ScanStatistics,
};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// An immutable dump.cs document
///
/// Every query performs a fresh scan over the source text; nothing is cached
/// between calls, so a `DumpFile` can be shared across threads freely. Use
/// [`DumpFile::build_index`] when many lookups are needed.
#[derive(Debug)]
pub struct DumpFile {
    source: String,
    path: Option<PathBuf>,
    config: Config,
    events: EventBus,
}

impl DumpFile {
    /// Load a dump from disk with the default configuration
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_config(path, Config::default())
    }

    /// Load a dump from disk
    pub fn load_with_config(path: &Path, config: Config) -> Result<Self> {
        info!("Loading dump from {:?}", path);
        let source = std::fs::read_to_string(path)?;
        debug!("Read {} bytes", source.len());

        Ok(Self {
            source,
            path: Some(path.to_path_buf()),
            config,
            events: EventBus::new(),
        })
    }

    /// Wrap source text that is already in memory
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            path: None,
            config: Config::default(),
            events: EventBus::new(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Receive every diagnostic raised by later queries
    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: Fn(&ScanEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(callback);
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fresh scan over the document's classes
    pub fn classes(&self) -> ClassScanner<'_> {
        ClassScanner::new(&self.source)
            .require_base_clause(self.config.require_base_clause)
            .with_events(&self.events)
    }

    /// Fresh scan over every RVA-annotated method in the document
    pub fn methods(&self) -> MethodScanner<'_> {
        MethodScanner::new(&self.source).with_events(&self.events)
    }

    /// First method named `name`, in document order
    pub fn find_method_by_name(&self, name: &str) -> Option<MethodRecord> {
        if name.is_empty() {
            return None;
        }
        self.methods().find(|m| m.name == name)
    }

    /// First method annotated with `offset`, in any accepted offset spelling
    pub fn find_method_by_offset(&self, offset: &str) -> Option<MethodRecord> {
        let Some(rva) = Rva::parse(offset) else {
            debug!("Ignoring malformed offset {:?}", offset);
            return None;
        };
        self.find_method_by_rva(rva)
    }

    pub fn find_method_by_rva(&self, rva: Rva) -> Option<MethodRecord> {
        self.methods().find(|m| m.offset == rva)
    }

    /// Full text (RVA comment through closing brace) of the method at `offset`
    pub fn method_text(&self, offset: &str) -> Option<String> {
        self.find_method_by_offset(offset).map(|m| m.full_text)
    }

    /// Name of the class whose body contains the method at `offset`
    pub fn find_class_of_method(&self, offset: &str) -> Option<String> {
        let rva = Rva::parse(offset)?;

        let Some(method) = self.find_method_by_rva(rva) else {
            crate::report(
                Some(&self.events),
                ScanEvent::MethodNotFound {
                    offset: rva.to_string(),
                },
            );
            return None;
        };

        match classes::class_at(self.classes(), method.span.start) {
            Some(class) => Some(class.name),
            None => {
                crate::report(Some(&self.events), ScanEvent::ClassNotFound { offset: rva });
                None
            }
        }
    }

    /// Look up several offsets at once; results line up with `offsets`
    pub fn find_methods_by_offsets<S>(&self, offsets: &[S]) -> Vec<Option<MethodRecord>>
    where
        S: AsRef<str> + Sync,
    {
        offsets
            .par_iter()
            .map(|offset| self.find_method_by_offset(offset.as_ref()))
            .collect()
    }

    /// First class selected by `name` under the configured match mode
    pub fn find_class(&self, name: &str) -> Option<ClassRecord> {
        classes::find_class(self.classes(), name, self.config.class_match)
    }

    /// Class selected by `name` together with its fields and methods
    pub fn class_info(&self, name: &str) -> Option<ClassInfo> {
        self.find_class(name).map(|class| self.members_of(class))
    }

    /// Every class with its members, in document order
    pub fn class_infos(&self) -> impl Iterator<Item = ClassInfo> + '_ {
        self.classes().map(|class| self.members_of(class))
    }

    fn members_of(&self, class: ClassRecord) -> ClassInfo {
        let fields = FieldScanner::new(&class.body_text).collect();

        // Spans come back relative to the body; shift them into the document.
        let base = class.span.start;
        let methods = MethodScanner::new(&class.body_text)
            .map(|mut method| {
                method.span = method.span.start + base..method.span.end + base;
                method
            })
            .collect();

        ClassInfo {
            class,
            fields,
            methods,
        }
    }

    /// Every class, field and method whose name looks obfuscated
    pub fn obfuscated_members(&self) -> Vec<ObfuscatedMember> {
        let classes: Vec<ClassRecord> = self.classes().collect();

        classes
            .into_par_iter()
            .flat_map_iter(|class| obfuscated_in(self.members_of(class)))
            .collect()
    }

    /// Index every method once for repeated lookups
    pub fn build_index(&self) -> OffsetIndex {
        OffsetIndex::build(self.classes(), self.methods())
    }

    /// Run a full scan and collect every structural diagnostic
    pub fn diagnostics(&self) -> Vec<ScanEvent> {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        let sink = Arc::clone(&collected);
        bus.subscribe(move |event| {
            if let Ok(mut events) = sink.lock() {
                events.push(event.clone());
            }
        });

        ClassScanner::new(&self.source)
            .require_base_clause(self.config.require_base_clause)
            .with_events(&bus)
            .for_each(drop);
        MethodScanner::new(&self.source).with_events(&bus).for_each(drop);

        let mut events = Vec::new();
        if let Ok(mut collected) = collected.lock() {
            events = std::mem::take(&mut *collected);
        }
        events
    }

    /// Summary statistics over the whole document
    pub fn report(&self) -> ScanReport {
        let mut statistics = ScanStatistics::default();
        let mut obfuscated = 0;

        for info in self.class_infos() {
            statistics.total_classes += 1;
            statistics.total_fields += info.fields.len();
            obfuscated += obfuscated_in(info).len();
        }

        statistics.total_methods = self.methods().count();
        statistics.obfuscated_members = obfuscated;
        statistics.diagnostics = self.diagnostics().len();

        info!(
            "Scan complete: {} classes, {} methods, {} fields, {} obfuscated",
            statistics.total_classes,
            statistics.total_methods,
            statistics.total_fields,
            statistics.obfuscated_members
        );

        ScanReport {
            timestamp: Utc::now(),
            source: self.path.as_ref().map(|p| p.display().to_string()),
            statistics,
        }
    }
}

fn obfuscated_in(info: ClassInfo) -> Vec<ObfuscatedMember> {
    let class_name = info.class.name;
    let mut flagged = Vec::new();

    if is_obfuscated(&class_name) {
        flagged.push(ObfuscatedMember {
            kind: MemberKind::Class,
            name: class_name.clone(),
            class_name: None,
            offset: None,
        });
    }

    for field in info.fields.into_iter().filter(|f| is_obfuscated(&f.name)) {
        flagged.push(ObfuscatedMember {
            kind: MemberKind::Field,
            name: field.name,
            class_name: Some(class_name.clone()),
            offset: None,
        });
    }

    for method in info.methods.into_iter().filter(|m| is_obfuscated(&m.name)) {
        flagged.push(ObfuscatedMember {
            kind: MemberKind::Method,
            name: method.name,
            class_name: Some(class_name.clone()),
            offset: Some(method.offset),
        });
    }

    flagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use dumpcs_core::ClassMatch;

    const ENEMY: &str = "\
class Enemy : MonoBehaviour
{
  // RVA: 0x1A2B3C4
  public void TakeDamage(int amount) {
    health -= amount;
  }
}";

    #[test]
    fn test_end_to_end_example() {
        let dump = DumpFile::from_source(ENEMY);

        let method = dump.find_method_by_name("TakeDamage").unwrap();
        assert_eq!(method.offset.to_string(), "0x01A2B3C4");
        assert_eq!(method.return_type, "void");
        assert_eq!(method.params, "int amount");
        assert!(method.body_text.contains("health -= amount;"));

        assert_eq!(dump.find_class_of_method("0x01A2B3C4").as_deref(), Some("Enemy"));
    }

    #[test]
    fn test_not_found_is_none() {
        let dump = DumpFile::from_source(ENEMY);
        assert!(dump.find_method_by_name("Heal").is_none());
        assert!(dump.find_method_by_name("").is_none());
        assert!(dump.find_method_by_offset("0x0BADF00D").is_none());
        assert!(dump.find_method_by_offset("zzz").is_none());
        assert!(dump.find_class_of_method("0x0BADF00D").is_none());
        assert!(dump.find_class("").is_none());
    }

    #[test]
    fn test_missing_class_lookup_is_reported() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dump = DumpFile::from_source(ENEMY);
        let sink = Arc::clone(&seen);
        dump.subscribe(move |e| sink.lock().unwrap().push(e.clone()));

        assert!(dump.find_class_of_method("0x00000001").is_none());
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[ScanEvent::MethodNotFound {
                offset: "0x00000001".into()
            }]
        );
    }

    #[test]
    fn test_quote_in_method_name_does_not_split_class() {
        let source = "\
class Enemy : Object
{
\t// RVA: 0x1000000
\tpublic void a\"b() {
\t\tx();
\t}

\t// RVA: 0x2000000
\tpublic void Later() { }
}";
        let dump = DumpFile::from_source(source);

        assert_eq!(dump.find_method_by_offset("0x1000000").unwrap().name, "a\"b");
        assert_eq!(dump.find_class_of_method("0x02000000").as_deref(), Some("Enemy"));
        assert_eq!(dump.find_class_of_method("0x01000000").as_deref(), Some("Enemy"));
        assert!(dump.diagnostics().is_empty());
    }

    #[test]
    fn test_method_text() {
        let dump = DumpFile::from_source(ENEMY);
        let text = dump.method_text("1a2b3c4").unwrap();
        assert!(text.starts_with("  // RVA: 0x1A2B3C4"));
        assert!(text.ends_with("  }"));
    }

    #[test]
    fn test_class_info_members() {
        let source = "\
class Enemy : MonoBehaviour
{
\tprivate int health;

\t// RVA: 0x0000100
\tpublic void Die() { }
}
";
        let dump = DumpFile::from_source(source);

        let info = dump.class_info("Enemy").unwrap();
        assert_eq!(info.class.name, "Enemy");
        assert_eq!(info.fields.len(), 1);
        assert_eq!(info.fields[0].name, "health");
        assert_eq!(info.methods.len(), 1);

        // Spans are document positions, so they agree with whole-document scans.
        let from_doc = dump.find_method_by_name("Die").unwrap();
        assert_eq!(info.methods[0].span, from_doc.span);
        assert_eq!(&source[from_doc.span.clone()], from_doc.full_text);
    }

    #[test]
    fn test_exact_class_match_config() {
        let source = "class EnemySpawner : Object\n{\n}\nclass Enemy : Object\n{\n}\n";
        let permissive = DumpFile::from_source(source);
        assert_eq!(permissive.find_class("Enemy").unwrap().name, "EnemySpawner");

        let exact = DumpFile::from_source(source).with_config(Config {
            class_match: ClassMatch::Exact,
            ..Config::default()
        });
        assert_eq!(exact.find_class("Enemy").unwrap().name, "Enemy");
    }

    #[test]
    fn test_batch_lookup_keeps_order() {
        let dump = DumpFile::from_source(ENEMY);
        let results = dump.find_methods_by_offsets(&["0x00000001", "0x01A2B3C4", "bad"]);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_none());
        assert_eq!(results[1].as_ref().map(|m| m.name.as_str()), Some("TakeDamage"));
        assert!(results[2].is_none());
    }

    #[test]
    fn test_obfuscated_members() {
        let source = "\
class 敌人 : MonoBehaviour
{
\tprivate int 血;
\tprivate int ammo;
\t// RVA: 0x0000200
\tpublic void 攻击() { }
\t// RVA: 0x0000300
\tpublic void Reload() { }
}
";
        let dump = DumpFile::from_source(source);
        let flagged = dump.obfuscated_members();
        let kinds: Vec<_> = flagged.iter().map(|m| (m.kind, m.name.as_str())).collect();
        assert_eq!(
            kinds,
            vec![
                (MemberKind::Class, "敌人"),
                (MemberKind::Field, "血"),
                (MemberKind::Method, "攻击"),
            ]
        );
        assert_eq!(flagged[2].offset, Some(Rva(0x200)));
        assert_eq!(flagged[2].class_name.as_deref(), Some("敌人"));
    }

    #[test]
    fn test_report_and_diagnostics() {
        let source = "\
class Ok : Object
{
\tpublic int a;
\t// RVA: 0x0000001
\tpublic void F() { }
}
class Broken : Object
{
\t// RVA: 0x0000002
\tpublic void G() {
";
        let dump = DumpFile::from_source(source);
        let diagnostics = dump.diagnostics();
        assert_eq!(diagnostics.len(), 2);
        assert!(matches!(diagnostics[0], ScanEvent::UnbalancedClass { .. }));
        assert!(matches!(diagnostics[1], ScanEvent::UnbalancedMethod { .. }));

        let report = dump.report();
        assert_eq!(report.statistics.total_classes, 1);
        assert_eq!(report.statistics.total_methods, 1);
        assert_eq!(report.statistics.total_fields, 1);
        assert_eq!(report.statistics.diagnostics, 2);
        assert!(report.source.is_none());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.cs");
        std::fs::write(&path, ENEMY).unwrap();

        let dump = DumpFile::load(&path).unwrap();
        assert_eq!(dump.path(), Some(path.as_path()));
        assert!(dump.find_method_by_offset("0x01A2B3C4").is_some());

        assert!(DumpFile::load(&dir.path().join("missing.cs")).is_err());
    }

    #[test]
    fn test_index_agrees_with_scans() {
        let dump = DumpFile::from_source(ENEMY);
        let index = dump.build_index();
        assert_eq!(
            index.find_method_by_name("TakeDamage").cloned(),
            dump.find_method_by_name("TakeDamage")
        );
        assert_eq!(
            index.find_class_of_method("0x01A2B3C4"),
            dump.find_class_of_method("0x01A2B3C4").as_deref()
        );
    }
}
