//! Project settings consumed during emission
//!
//! The host application owns project configuration; the emission core reads
//! it through [`ProjectSettings`]. The struct follows builder conventions:
//! start from [`ProjectSettings::default`] and chain `with_*` calls.

/// Internationalization flavor selected for the generated code.
///
/// Selects the translation-function preamble written at the top of the
/// source file and the format of the strings export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum I18nFlavor {
    /// No translation support; labels are emitted as plain literals.
    None,
    /// GNU gettext style message catalogs.
    Gettext(GettextSettings),
    /// POSIX catgets style message catalogs.
    Catgets(CatgetsSettings),
}

/// Auxiliary strings for the gettext flavor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GettextSettings {
    /// Header to include, e.g. `<libintl.h>`. Angle brackets or quotes are
    /// kept if present; a bare name is quoted.
    pub include: String,
    /// If non-empty, the include is wrapped in `#ifdef <conditional>` with a
    /// defensive fallback definition in the `#else` arm.
    pub conditional: String,
    /// Name of the translation function macro, e.g. `gettext`.
    pub function: String,
    /// Name of the static-initializer translation macro, if any.
    pub static_function: String,
}

impl Default for GettextSettings {
    fn default() -> Self {
        Self {
            include: "<libintl.h>".to_string(),
            conditional: String::new(),
            function: "gettext".to_string(),
            static_function: String::new(),
        }
    }
}

/// Auxiliary strings for the catgets flavor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatgetsSettings {
    /// Header to include, e.g. `<nl_types.h>`.
    pub include: String,
    /// If non-empty, the include is wrapped in `#ifdef <conditional>` with a
    /// defensive `catgets` fallback in the `#else` arm.
    pub conditional: String,
    /// Name of an externally managed `nl_catd` catalog variable. When empty,
    /// the preamble opens the catalog itself via `catopen`.
    pub catalog_file: String,
    /// Message set number used by `$set` in the strings export.
    pub set_number: String,
}

impl Default for CatgetsSettings {
    fn default() -> Self {
        Self {
            include: "<nl_types.h>".to_string(),
            conditional: String::new(),
            catalog_file: String::new(),
            set_number: "1".to_string(),
        }
    }
}

/// Read-only project configuration for one emit or merge-back pass.
#[derive(Debug, Clone)]
pub struct ProjectSettings {
    /// Project name, used as the catalog name for `catopen`.
    pub project_name: String,
    /// Configured name of the header file, as the user typed it. A leading
    /// `.` selects basename-relative inclusion.
    pub header_file_name: String,
    /// Base toolkit header emitted once into the header file.
    pub toolkit_include: String,
    /// Whether the source file includes its companion header.
    pub include_header_from_source: bool,
    /// Suppress the base toolkit include at the top of the header.
    pub avoid_early_includes: bool,
    /// Pass non-ASCII bytes through string escaping verbatim (UTF-8 source).
    pub utf8_in_src: bool,
    /// Emit per-block integrity tags and allow merge-back.
    pub write_mergeback_data: bool,
    /// Selected i18n flavor with its auxiliary strings.
    pub i18n: I18nFlavor,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            project_name: "untitled".to_string(),
            header_file_name: ".h".to_string(),
            toolkit_include: "<FL/Fl.H>".to_string(),
            include_header_from_source: true,
            avoid_early_includes: false,
            utf8_in_src: true,
            write_mergeback_data: false,
            i18n: I18nFlavor::None,
        }
    }
}

impl ProjectSettings {
    /// Create settings with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the project name.
    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = name.into();
        self
    }

    /// Set the configured header file name.
    pub fn with_header_file_name(mut self, name: impl Into<String>) -> Self {
        self.header_file_name = name.into();
        self
    }

    /// Select the i18n flavor.
    pub fn with_i18n(mut self, flavor: I18nFlavor) -> Self {
        self.i18n = flavor;
        self
    }

    /// Enable or disable merge-back tagging.
    pub fn with_mergeback(mut self, enabled: bool) -> Self {
        self.write_mergeback_data = enabled;
        self
    }

    /// Enable or disable verbatim UTF-8 in emitted string literals.
    pub fn with_utf8_in_src(mut self, enabled: bool) -> Self {
        self.utf8_in_src = enabled;
        self
    }

    /// The project file's basename, used by the catgets preamble.
    pub fn basename(&self) -> &str {
        &self.project_name
    }
}
