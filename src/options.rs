use serde::Deserialize;

/// Store level defaults for every operation.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Defaults {
    /// Base IRI for relative references. Empty means none.
    pub base: String,
    pub overwrite: bool,
    pub cut: bool,
    pub recurse: bool,
    pub sync: bool,
    pub preserve: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            base: String::new(),
            overwrite: false,
            cut: false,
            recurse: false,
            sync: true,
            preserve: false,
        }
    }
}

/// Per call options. Unset fields fall back to [`Defaults`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Options {
    pub base: Option<String>,
    /// Cut the root subjects before writing.
    pub overwrite: Option<bool>,
    /// Batch write when true, streaming write otherwise.
    pub sync: Option<bool>,
    /// Return the document with store assigned blank node ids.
    pub blank_ids: Option<bool>,
    /// Route `del` through `cut`.
    pub cut: Option<bool>,
    /// Cut walks follow IRI objects too.
    pub recurse: Option<bool>,
    /// Never delete before writing. Wins over `overwrite`.
    pub preserve: Option<bool>,
}

impl Options {
    pub fn base(mut self, base: impl Into<String>) -> Options {
        self.base = Some(base.into());
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Options {
        self.overwrite = Some(overwrite);
        self
    }

    pub fn sync(mut self, sync: bool) -> Options {
        self.sync = Some(sync);
        self
    }

    pub fn blank_ids(mut self, blank_ids: bool) -> Options {
        self.blank_ids = Some(blank_ids);
        self
    }

    pub fn cut(mut self, cut: bool) -> Options {
        self.cut = Some(cut);
        self
    }

    pub fn recurse(mut self, recurse: bool) -> Options {
        self.recurse = Some(recurse);
        self
    }

    pub fn preserve(mut self, preserve: bool) -> Options {
        self.preserve = Some(preserve);
        self
    }

    pub(crate) fn resolve(&self, defaults: &Defaults) -> Effective {
        let preserve = self.preserve.unwrap_or(defaults.preserve);
        Effective {
            base: self
                .base
                .clone()
                .filter(|base| !base.is_empty())
                .or_else(|| Some(defaults.base.clone()).filter(|base| !base.is_empty())),
            overwrite: !preserve && self.overwrite.unwrap_or(defaults.overwrite),
            sync: self.sync.unwrap_or(defaults.sync),
            blank_ids: self.blank_ids.unwrap_or(false),
            cut: self.cut.unwrap_or(defaults.cut),
            recurse: self.recurse.unwrap_or(defaults.recurse),
        }
    }
}

/// Options with every default applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Effective {
    pub(crate) base: Option<String>,
    pub(crate) overwrite: bool,
    pub(crate) sync: bool,
    pub(crate) blank_ids: bool,
    pub(crate) cut: bool,
    pub(crate) recurse: bool,
}

impl Effective {
    /// `@context.@base` of the document wins over the configured base.
    pub(crate) fn with_document_base(mut self, document: &serde_json::Value) -> Effective {
        if let Some(base) = crate::graph::context_base(document) {
            self.base = Some(base.to_owned());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn call_options_override_defaults() {
        let defaults = Defaults {
            base: "http://ex.org/".into(),
            overwrite: true,
            ..Default::default()
        };
        let effective = Options::default().resolve(&defaults);
        assert_eq!(effective.base.as_deref(), Some("http://ex.org/"));
        assert!(effective.overwrite);
        assert!(effective.sync);

        let effective = Options::default()
            .base("http://other.org/")
            .overwrite(false)
            .sync(false)
            .resolve(&defaults);
        assert_eq!(effective.base.as_deref(), Some("http://other.org/"));
        assert!(!effective.overwrite);
        assert!(!effective.sync);
    }

    #[test]
    fn preserve_disables_overwrite() {
        let effective = Options::default()
            .overwrite(true)
            .preserve(true)
            .resolve(&Defaults::default());
        assert!(!effective.overwrite);
    }

    #[test]
    fn document_base_wins() {
        let document = json!({ "@context": { "@base": "http://doc.org/" } });
        let effective = Options::default()
            .base("http://call.org/")
            .resolve(&Defaults::default())
            .with_document_base(&document);
        assert_eq!(effective.base.as_deref(), Some("http://doc.org/"));

        let empty = Options::default().resolve(&Defaults::default());
        assert_eq!(empty.base, None);
    }
}
