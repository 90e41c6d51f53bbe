//! Static single-page-app asset serving and REST launch shortcuts (§6).
//!
//! The embedded web-app filesystem and platform-specific launcher dispatch
//! are external collaborators (spec §1); this module fixes only the
//! interface the HTTP surface consumes.

use async_trait::async_trait;

/// One served asset: its MIME type and raw bytes.
pub struct Asset {
    pub mime: &'static str,
    pub bytes: Vec<u8>,
    /// Modification time, used for the SPA fallback's own `index.html`
    /// response (§6: "SPA fallback returns index.html with its own mtime").
    pub mtime: Option<std::time::SystemTime>,
}

/// The embedded web-app filesystem, behind a trait so the core never
/// depends on a concrete bundling mechanism.
#[async_trait]
pub trait StaticAssets: Send + Sync {
    /// Look up one asset by its path under `/app`. `path` has no leading
    /// slash (e.g. `"index.html"`, `"assets/app.js"`).
    async fn get(&self, path: &str) -> Option<Asset>;
}

/// Guess a MIME type from a file extension, with the fallbacks the spec
/// calls out explicitly for font formats (§6).
pub fn mime_for_extension(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}

/// A trivial in-memory `StaticAssets` implementation serving a placeholder
/// `index.html`, used by the reference binary and tests. A real embedded
/// filesystem (spec §1's "embedded web-app static filesystem") is an
/// external collaborator.
pub struct PlaceholderAssets {
    index_html: Vec<u8>,
}

impl Default for PlaceholderAssets {
    fn default() -> Self {
        Self { index_html: b"<!doctype html><title>zaparoo</title>".to_vec() }
    }
}

#[async_trait]
impl StaticAssets for PlaceholderAssets {
    async fn get(&self, path: &str) -> Option<Asset> {
        if path.is_empty() || path == "index.html" {
            Some(Asset { mime: "text/html; charset=utf-8", bytes: self.index_html.clone(), mtime: None })
        } else {
            None
        }
    }
}

/// Dispatches a REST launch shortcut (`/l/*`, `/r/*`, `/run/*`) to the
/// platform-specific launcher. Out of scope per spec §1; the core calls
/// this trait but does not implement a concrete launcher.
#[async_trait]
pub trait LaunchDispatcher: Send + Sync {
    /// `virtual_path` is the path segment after the route prefix (e.g. for
    /// `GET /l/snes/mario.sfc` this is `snes/mario.sfc`).
    async fn launch(&self, virtual_path: &str) -> anyhow::Result<()>;
}

/// A launcher that always succeeds without doing anything, used by tests
/// and as the reference binary's default.
#[derive(Default)]
pub struct NoopLaunchDispatcher;

#[async_trait]
impl LaunchDispatcher for NoopLaunchDispatcher {
    async fn launch(&self, virtual_path: &str) -> anyhow::Result<()> {
        tracing::info!(virtual_path, "launch dispatched (noop)");
        Ok(())
    }
}
