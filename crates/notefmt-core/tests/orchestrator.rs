use notefmt_core::{
    Context, Error, FormatterConfig, NoMedia, NoTitles, Record, RecordStore, RecordingReporter,
    Result, Severity, Summary, TransformerConfig, TransformerRegistry, TypeConfig, run,
};

#[derive(Debug, Clone, PartialEq)]
struct Note {
    id: u64,
    note_type: String,
    fields: Vec<(String, String)>,
}

impl Note {
    fn new(id: u64, note_type: &str, fields: &[(&str, &str)]) -> Self {
        Self {
            id,
            note_type: note_type.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl Record for Note {
    fn id(&self) -> String {
        self.id.to_string()
    }

    fn type_name(&self) -> &str {
        &self.note_type
    }

    fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|(k, _)| k.clone()).collect()
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn set_field(&mut self, name: &str, value: String) {
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| k == name) {
            slot.1 = value;
        }
    }
}

#[derive(Default)]
struct MemoryStore {
    notes: Vec<Note>,
    updates: Vec<Vec<Note>>,
}

impl RecordStore for MemoryStore {
    type Record = Note;

    fn selected(&mut self) -> Result<Vec<Note>> {
        Ok(self.notes.clone())
    }

    fn update(&mut self, changed: Vec<Note>) -> Result<()> {
        for note in &changed {
            if let Some(slot) = self.notes.iter_mut().find(|n| n.id == note.id) {
                *slot = note.clone();
            }
        }
        self.updates.push(changed);
        Ok(())
    }
}

fn templates(registry: &TransformerRegistry) -> TransformerConfig {
    let fields = |pairs: &[(&str, &str)]| {
        pairs
            .iter()
            .map(|(f, t)| (f.to_string(), t.to_string()))
            .collect()
    };
    TransformerConfig::from_types(
        [
            TypeConfig {
                name: "Cloze".to_string(),
                fields: fields(&[
                    ("Text", "html"),
                    ("Source", "source"),
                    ("Date", "date"),
                    ("Notes", "skip"),
                ]),
            },
            TypeConfig {
                name: "Occlusion".to_string(),
                fields: fields(&[("Image", "imageOcclusionSVG")]),
            },
        ],
        registry,
    )
    .unwrap()
}

fn run_batch(store: &mut MemoryStore, reporter: &RecordingReporter) -> Result<Summary> {
    let registry = TransformerRegistry::default_transformers();
    let config = templates(&registry);
    let formatter = FormatterConfig::default();
    let ctx = Context {
        minimized: false,
        config: &formatter,
        reporter,
        titles: &NoTitles,
        media: &NoMedia,
    };
    run(store, &config, &registry, &ctx)
}

#[test]
fn only_changed_records_are_persisted() {
    let canonical = Note::new(
        1,
        "Cloze",
        &[
            ("Text", "<strong>foo</strong> bar"),
            ("Source", "AMBOSS, Wikipedia"),
            ("Date", "06/2024"),
            ("Notes", "<b>kept</b>"),
        ],
    );
    let messy = Note::new(
        2,
        "Cloze+",
        &[
            ("Text", "<b>foo</b> bar"),
            ("Source", "Wikipedia, AMBOSS"),
            ("Date", "3.6.24"),
            ("Notes", "<b>kept</b>"),
        ],
    );
    let bad_date = Note::new(
        3,
        "Cloze",
        &[
            ("Text", "plain"),
            ("Source", ""),
            ("Date", "someday"),
            ("Notes", ""),
        ],
    );
    let mut store = MemoryStore {
        notes: vec![canonical.clone(), messy, bad_date.clone()],
        updates: Vec::new(),
    };
    let reporter = RecordingReporter::new();

    let summary = run_batch(&mut store, &reporter).unwrap();
    assert_eq!(
        summary,
        Summary {
            processed: 3,
            updated: 1
        }
    );
    assert_eq!(summary.to_string(), "Updated 1 note!");

    assert_eq!(store.updates.len(), 1);
    assert_eq!(
        store.updates[0],
        vec![Note::new(
            2,
            "Cloze+",
            &[
                ("Text", "<strong>foo</strong> bar"),
                ("Source", "AMBOSS, Wikipedia"),
                ("Date", "06/2024"),
                ("Notes", "<b>kept</b>"),
            ],
        )]
    );
    assert_eq!(store.notes[0], canonical);
    assert_eq!(store.notes[2], bad_date);

    let reports = reporter.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].severity, Severity::Critical);
    assert!(reports[0].message.starts_with("3 / Date: "), "{}", reports[0].message);

    // Second run is a no-op.
    let summary = run_batch(&mut store, &reporter).unwrap();
    assert_eq!(summary.updated, 0);
    assert_eq!(store.updates.len(), 2);
    assert!(store.updates[1].is_empty());
}

#[test]
fn fatal_errors_abort_without_persisting() {
    let mut store = MemoryStore {
        notes: vec![
            Note::new(1, "Cloze", &[("Text", "<b>changed</b>")]),
            Note::new(2, "Cloze", &[("Text", "<ul><li>unbalanced</ul>")]),
        ],
        updates: Vec::new(),
    };
    let err = run_batch(&mut store, &RecordingReporter::new()).unwrap_err();
    match err {
        Error::Field { record, field, source } => {
            assert_eq!(record, "2");
            assert_eq!(field, "Text");
            assert!(matches!(*source, Error::MalformedHtml { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(store.updates.is_empty());
}

#[test]
fn unconfigured_record_types_are_fatal() {
    let mut store = MemoryStore {
        notes: vec![
            Note::new(1, "Cloze", &[("Text", "<b>changed</b>")]),
            Note::new(2, "Basic", &[("Front", "x")]),
        ],
        updates: Vec::new(),
    };
    let err = run_batch(&mut store, &RecordingReporter::new()).unwrap_err();
    match err {
        Error::Field { record, field, source } => {
            assert_eq!(record, "2");
            assert_eq!(field, "Front");
            assert!(
                matches!(*source, Error::MissingTypeConfig { ref record_type } if record_type == "Basic")
            );
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(store.updates.is_empty());

    let mut store = MemoryStore {
        notes: vec![Note::new(1, "Cloze", &[("Back", "x")])],
        updates: Vec::new(),
    };
    let err = run_batch(&mut store, &RecordingReporter::new()).unwrap_err();
    assert!(matches!(err, Error::Field { ref record, ref field, ref source }
        if record == "1" && field == "Back" && matches!(**source, Error::MissingFieldConfig { .. })));
    assert!(err.to_string().starts_with("Record `1`, field `Back`:"), "{err}");
}

#[test]
fn occlusion_without_media_is_fatal() {
    let mut store = MemoryStore {
        notes: vec![Note::new(1, "Occlusion", &[("Image", "<img src=\"a.svg\">")])],
        updates: Vec::new(),
    };
    let err = run_batch(&mut store, &RecordingReporter::new()).unwrap_err();
    assert!(matches!(err, Error::Field { .. }));
}
