//! Renderables: opaque "what to draw" handles.
//!
//! Equality is identity, not content. Two bars that share one group hand out
//! clones of the same [`Renderable`], which is how the manager collapses them
//! into a single composite entry.

use std::fmt;
use std::sync::Arc;

/// Something that can be drawn as a block of terminal lines.
pub trait Render: Send + Sync {
    /// Lines for the given terminal width. Lines may contain ANSI styling.
    fn lines(&self, width: u16) -> Vec<String>;
}

/// Shared, cheaply cloneable handle to a [`Render`] implementation.
#[derive(Clone)]
pub struct Renderable(Arc<dyn Render>);

impl Renderable {
    /// Wrap a fresh renderer.
    pub fn new(render: impl Render + 'static) -> Self {
        Self(Arc::new(render))
    }

    /// Wrap an already shared renderer, keeping its identity.
    pub fn from_arc(render: Arc<dyn Render>) -> Self {
        Self(render)
    }

    /// A static block of text, split on newlines.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Text(text.into()))
    }

    /// Lines for the given width.
    pub fn lines(&self, width: u16) -> Vec<String> {
        self.0.lines(width)
    }

    /// Whether both handles point at the same renderer.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Renderable {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Renderable {}

impl fmt::Debug for Renderable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Renderable")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

/// Plain text block.
#[derive(Debug, Clone)]
struct Text(String);

impl Render for Text {
    fn lines(&self, _width: u16) -> Vec<String> {
        self.0.lines().map(str::to_string).collect()
    }
}

/// Render a composite into lines, in order.
pub fn compose_lines(composite: &[Renderable], width: u16) -> Vec<String> {
    composite.iter().flat_map(|r| r.lines(width)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_identity() {
        let a = Renderable::text("same");
        let b = Renderable::text("same");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_compose_lines_keeps_order() {
        let composite = [Renderable::text("one\ntwo"), Renderable::text("three")];
        assert_eq!(compose_lines(&composite, 80), vec!["one", "two", "three"]);
    }
}
