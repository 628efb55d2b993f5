// ABOUTME: Hierarchical task instance id generation
// ABOUTME: One free-running counter per generator, prefixed with the parent id

use std::sync::atomic::{AtomicU64, Ordering};

pub const DEFAULT_SEPARATOR: &str = "-";

/// Produces hierarchical, monotonically increasing instance ids. The counter
/// is global to the generator rather than per parent, so every id handed out
/// by one generator is unique for its lifetime. A fresh generator is created
/// per execution session; nested sub-workflow runs therefore cannot collide
/// with the parent run's ids.
#[derive(Debug)]
pub struct IdGenerator {
    counter: AtomicU64,
    separator: String,
}

impl IdGenerator {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            counter: AtomicU64::new(0),
            separator: separator.into(),
        }
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn generate(&self, parent: Option<&str>) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        match parent {
            Some(parent) if !parent.is_empty() => {
                format!("{}{}{}", parent, self.separator, n)
            }
            _ => n.to_string(),
        }
    }

    /// The prefix of `id` up to the last occurrence of `separator`, or the
    /// empty string for a root id. A pure string operation; it holds for any
    /// id this generator produced, whatever the separator.
    pub fn parent_id<'a>(id: &'a str, separator: &str) -> &'a str {
        match id.rfind(separator) {
            Some(pos) => &id[..pos],
            None => "",
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR)
    }
}
