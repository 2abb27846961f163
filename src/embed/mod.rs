//! Embedded client-side sources.
//!
//! - `bundle` - module registry prelude wrapped around every bundle
//! - `bootstrap` - runtime module and loader template for the bootstrap assets

mod template;

pub use template::{Template, TemplateVars};

pub mod bundle {
    use super::{Template, TemplateVars};

    /// Variables for the module registry prelude.
    pub struct PreludeVars<'a> {
        /// Module ids resolved through the previously loaded registry.
        pub externals: &'a [String],
        /// `define(...)` calls followed by entry `require(...)` calls.
        pub body: &'a str,
    }

    impl TemplateVars for PreludeVars<'_> {
        fn apply(&self, content: &str) -> String {
            let externals = serde_json::to_string(self.externals).unwrap_or_else(|_| "[]".into());
            content
                .replace("__KILN_EXTERNALS__", &externals)
                .replace("__KILN_BODY__", self.body)
        }
    }

    pub const PRELUDE_JS: Template<PreludeVars<'static>> =
        Template::new(include_str!("bundle/prelude.js"));
}

pub mod bootstrap {
    use super::{Template, TemplateVars};

    /// Token replaced by the serialized bootstrap payload.
    pub const BOOTSTRAP_TOKEN: &str = "__KILN_BOOTSTRAP__";

    /// Client runtime module, exposed as `kiln`.
    pub const RUNTIME_JS: &str = include_str!("bootstrap/runtime.js");

    /// Variables for the loader template.
    pub struct LoaderVars<'a> {
        /// JSON `{version, manifest}`.
        pub payload: &'a str,
    }

    impl TemplateVars for LoaderVars<'_> {
        fn apply(&self, content: &str) -> String {
            content.replace(BOOTSTRAP_TOKEN, self.payload)
        }
    }

    pub const LOADER_JS: Template<LoaderVars<'static>> =
        Template::new(include_str!("bootstrap/loader.js"));
}
