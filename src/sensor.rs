use std::fs;
use std::path::PathBuf;

/// What the engine can see of the observed page on one sampling tick.
///
/// `identity` is the page's navigational identity (path + query) and doubles
/// as the task id; `None` means the sensor is not looking at a task page.
/// `text` is the visible page text, `None` when extraction failed. Both are
/// best-effort signals, never errors.
#[derive(Debug, Clone, Default)]
pub struct PageSample {
    pub identity: Option<String>,
    pub text: Option<String>,
}

/// Source of page samples. The production build observes a live document;
/// the CLI reads a file; tests supply scripted samples.
pub trait PageSensor: Send + Sync + 'static {
    fn sample(&self) -> PageSample;
}

/// Reads the "page" from a local text file, for manual runs and debugging.
///
/// Format: a first line of `@<task-identity>` names the task page; every
/// following line is page text. A file without the `@` line is treated as a
/// non-task page, a missing file as no page at all.
pub struct FileSensor {
    path: PathBuf,
}

impl FileSensor {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl PageSensor for FileSensor {
    fn sample(&self) -> PageSample {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(_) => return PageSample::default(),
        };

        let mut lines = contents.lines();
        match lines.next() {
            Some(first) if first.starts_with('@') => PageSample {
                identity: Some(first[1..].trim().to_string()),
                text: Some(lines.collect::<Vec<_>>().join("\n")),
            },
            _ => PageSample {
                identity: None,
                text: Some(contents),
            },
        }
    }
}
