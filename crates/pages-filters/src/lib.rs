//! Content filters for the pages asset pipeline.
//!
//! Every transform the pipeline performs (Sass, script down-levelling,
//! templates, image compression, reference rewriting, minification) is a
//! [`Filter`]: one asset in, zero or more assets out.

pub mod conditional;
pub mod css;
pub mod html;
pub mod imagemin;
pub mod sass;
pub mod script;
pub mod template;
pub mod traits;
pub mod useref;

pub use conditional::WhenExtension;
pub use css::{minify_css, CssMinifyFilter};
pub use html::{minify_html, HtmlMinifyFilter, HtmlMinifyOptions};
pub use imagemin::ImageminFilter;
pub use sass::SassFilter;
pub use script::{minify_js, transpile, JsMinifyFilter, TranspileFilter};
pub use template::TemplateFilter;
pub use traits::{apply_chain, Asset, Filter, FilterError};
pub use useref::UserefFilter;
