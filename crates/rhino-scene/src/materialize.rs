//! Scene materialization into a live canvas
//!
//! The canvas is abstracted behind [`Canvas`] so the same pass drives the
//! Figma plugin host or the in-memory [`MemoryCanvas`] used for dry runs.
//! Every node created here carries the [`SYNC_TAG_KEY`] tag; the next pass
//! removes exactly those nodes and nothing else.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::{self, Write as _};
use tracing::{debug, info, warn};

use crate::error::CanvasError;
use crate::scene::{Color, FontName, NodeKind, SceneNode, TextNode, VectorPath};

pub const SYNC_TAG_KEY: &str = "rhino-sync";
pub const SYNC_TAG_VALUE: &str = "scene-node";

/// Figma rejects zero-sized nodes
pub const MIN_FRAME_EXTENT: f64 = 1.0;
pub const MIN_VECTOR_EXTENT: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub u64);

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameProps<'a> {
    pub name: &'a str,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub fill: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorProps<'a> {
    pub name: &'a str,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub stroke: Color,
    pub stroke_weight: f64,
    pub path: &'a VectorPath,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextProps<'a> {
    pub characters: &'a str,
    /// `None` keeps the canvas default font.
    pub font: Option<&'a FontName>,
    pub font_size: f64,
    pub fill: Color,
}

/// Result of waiting on a font
#[derive(Debug, Clone, PartialEq)]
pub enum FontOutcome {
    Loaded,
    Fallback { reason: String },
}

/// The target canvas. Mirrors the small slice of the Figma plugin API the
/// sync needs.
#[async_trait]
pub trait Canvas: Send {
    /// Every node on the current page (at any depth) whose tag `key` equals
    /// `value`.
    fn find_tagged(&self, key: &str, value: &str) -> Vec<NodeHandle>;

    /// Remove a node and its descendants. Removing a node that is already
    /// gone is not an error.
    fn remove(&mut self, node: NodeHandle) -> Result<(), CanvasError>;

    fn set_tag(&mut self, node: NodeHandle, key: &str, value: &str) -> Result<(), CanvasError>;

    fn create_frame(&mut self, props: &FrameProps<'_>) -> Result<NodeHandle, CanvasError>;

    fn create_vector(&mut self, props: &VectorProps<'_>) -> Result<NodeHandle, CanvasError>;

    fn create_text(&mut self, name: &str, x: f64, y: f64) -> Result<NodeHandle, CanvasError>;

    async fn load_font(&mut self, font: &FontName) -> Result<(), CanvasError>;

    fn set_text(&mut self, node: NodeHandle, props: &TextProps<'_>) -> Result<(), CanvasError>;

    /// Append to `parent`, or to the page root when `None`.
    fn append_child(&mut self, parent: Option<NodeHandle>, child: NodeHandle) -> Result<(), CanvasError>;

    /// Insert at `index` among the page root's children.
    fn insert_page_child(&mut self, index: usize, child: NodeHandle) -> Result<(), CanvasError>;

    fn set_position(&mut self, node: NodeHandle, x: f64, y: f64) -> Result<(), CanvasError>;

    /// Select the nodes and fit the viewport to them.
    fn select_and_focus(&mut self, nodes: &[NodeHandle]);
}

/// A node that could not be materialized
#[derive(Debug, Clone, PartialEq)]
pub struct NodeFailure {
    pub id: String,
    pub error: CanvasError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterializeReport {
    pub removed: usize,
    pub created: Vec<NodeHandle>,
    pub failures: Vec<NodeFailure>,
    /// Ids of text nodes created with the fallback font
    pub font_fallbacks: Vec<String>,
}

/// Remove everything a previous pass created. Returns the number of tagged
/// nodes found.
pub fn clear<C: Canvas + ?Sized>(canvas: &mut C) -> usize {
    let tagged = canvas.find_tagged(SYNC_TAG_KEY, SYNC_TAG_VALUE);
    for node in &tagged {
        if let Err(e) = canvas.remove(*node) {
            warn!("Failed to remove synced node {}: {}", node, e);
        }
    }
    tagged.len()
}

struct LiveFrame {
    handle: NodeHandle,
    x: f64,
    y: f64,
}

/// Replace the previous synced output with `nodes`.
///
/// Frames are created first so children can always find their parent, then
/// vectors, then texts. A node that fails is logged and skipped.
pub async fn materialize<C: Canvas + ?Sized>(canvas: &mut C, nodes: &[SceneNode]) -> MaterializeReport {
    let mut report = MaterializeReport {
        removed: clear(canvas),
        ..Default::default()
    };

    let mut frames: HashMap<&str, LiveFrame> = HashMap::new();

    // Page slot of the next frame; failed frames take no slot
    let mut slot = 0;
    for node in nodes.iter().filter(|n| n.is_frame()) {
        match create_frame(canvas, node, slot) {
            Ok(handle) => {
                slot += 1;
                frames.insert(node.id.as_str(), LiveFrame { handle, x: node.x, y: node.y });
                report.created.push(handle);
            }
            Err(error) => record_failure(&mut report, node, error),
        }
    }

    for node in nodes {
        if let NodeKind::Vector(_) = node.kind {
            match create_vector(canvas, node, &frames) {
                Ok(handle) => report.created.push(handle),
                Err(error) => record_failure(&mut report, node, error),
            }
        }
    }

    for node in nodes {
        if let NodeKind::Text(text) = &node.kind {
            match create_text(canvas, node, text, &frames).await {
                Ok((handle, outcome)) => {
                    if let FontOutcome::Fallback { reason } = outcome {
                        warn!("Font load failed for {}, using fallback font: {}", node.id, reason);
                        report.font_fallbacks.push(node.id.clone());
                    }
                    report.created.push(handle);
                }
                Err(error) => record_failure(&mut report, node, error),
            }
        }
    }

    if !report.created.is_empty() {
        canvas.select_and_focus(&report.created);
    }

    info!(
        "Materialized {} nodes ({} removed, {} failed, {} font fallbacks)",
        report.created.len(),
        report.removed,
        report.failures.len(),
        report.font_fallbacks.len()
    );
    report
}

fn record_failure(report: &mut MaterializeReport, node: &SceneNode, error: CanvasError) {
    warn!("Skipping node {}: {}", node.id, error);
    report.failures.push(NodeFailure {
        id: node.id.clone(),
        error,
    });
}

/// Run `build` on a freshly created node; on failure the half-built node is
/// removed so no untagged leftovers remain.
fn finish<C: Canvas + ?Sized>(
    canvas: &mut C,
    handle: NodeHandle,
    build: impl FnOnce(&mut C) -> Result<(), CanvasError>,
) -> Result<NodeHandle, CanvasError> {
    let result = canvas
        .set_tag(handle, SYNC_TAG_KEY, SYNC_TAG_VALUE)
        .and_then(|()| build(canvas));
    match result {
        Ok(()) => Ok(handle),
        Err(e) => {
            let _ = canvas.remove(handle);
            Err(e)
        }
    }
}

fn create_frame<C: Canvas + ?Sized>(
    canvas: &mut C,
    node: &SceneNode,
    slot: usize,
) -> Result<NodeHandle, CanvasError> {
    let NodeKind::Frame(frame) = &node.kind else {
        unreachable!("create_frame called with {}", node.type_name());
    };
    let handle = canvas.create_frame(&FrameProps {
        name: &node.name,
        x: node.x,
        y: node.y,
        width: frame.width.max(MIN_FRAME_EXTENT),
        height: frame.height.max(MIN_FRAME_EXTENT),
        fill: Color::WHITE,
    })?;
    // Synced frames sit below everything else, in batch order
    finish(canvas, handle, |c| c.insert_page_child(slot, handle))
}

fn create_vector<C: Canvas + ?Sized>(
    canvas: &mut C,
    node: &SceneNode,
    frames: &HashMap<&str, LiveFrame>,
) -> Result<NodeHandle, CanvasError> {
    let NodeKind::Vector(vector) = &node.kind else {
        unreachable!("create_vector called with {}", node.type_name());
    };
    let handle = canvas.create_vector(&VectorProps {
        name: &node.name,
        x: node.x,
        y: node.y,
        width: vector.width.max(MIN_VECTOR_EXTENT),
        height: vector.height.max(MIN_VECTOR_EXTENT),
        stroke: vector.stroke_color,
        stroke_weight: vector.stroke_weight,
        path: &vector.path,
    })?;
    finish(canvas, handle, |c| attach(c, handle, node, frames))
}

async fn create_text<C: Canvas + ?Sized>(
    canvas: &mut C,
    node: &SceneNode,
    text: &TextNode,
    frames: &HashMap<&str, LiveFrame>,
) -> Result<(NodeHandle, FontOutcome), CanvasError> {
    let outcome = match canvas.load_font(&text.font).await {
        Ok(()) => FontOutcome::Loaded,
        Err(e) => FontOutcome::Fallback { reason: e.to_string() },
    };
    let font = match outcome {
        FontOutcome::Loaded => Some(&text.font),
        FontOutcome::Fallback { .. } => None,
    };

    let handle = canvas.create_text(&node.name, node.x, node.y)?;
    let handle = finish(canvas, handle, |c| {
        c.set_text(
            handle,
            &TextProps {
                characters: &text.text,
                font,
                font_size: text.font_size,
                fill: text.fill_color,
            },
        )?;
        attach(c, handle, node, frames)
    })?;
    Ok((handle, outcome))
}

/// Parent under the matching frame (rebased into its local space) or the
/// page root.
fn attach<C: Canvas + ?Sized>(
    canvas: &mut C,
    handle: NodeHandle,
    node: &SceneNode,
    frames: &HashMap<&str, LiveFrame>,
) -> Result<(), CanvasError> {
    match node.parent_frame_id().and_then(|id| frames.get(id)) {
        Some(frame) => {
            canvas.append_child(Some(frame.handle), handle)?;
            canvas.set_position(handle, node.x - frame.x, node.y - frame.y)
        }
        None => {
            if let Some(id) = node.parent_frame_id() {
                debug!("Parent frame {} not found for {}, attaching to page", id, node.id);
            }
            canvas.append_child(None, handle)
        }
    }
}

// ============================================================================
// In-memory canvas
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryNodeType {
    Frame,
    Vector,
    Text,
    /// Content the sync did not create
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryNode {
    pub node_type: MemoryNodeType,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub fill: Option<Color>,
    pub stroke: Option<Color>,
    pub stroke_weight: f64,
    pub path: Option<VectorPath>,
    pub characters: String,
    pub font: FontName,
    pub font_size: f64,
    pub tags: BTreeMap<String, String>,
    pub parent: Option<NodeHandle>,
    pub children: Vec<NodeHandle>,
}

impl MemoryNode {
    fn new(node_type: MemoryNodeType, name: &str, x: f64, y: f64) -> Self {
        Self {
            node_type,
            name: name.to_string(),
            x,
            y,
            width: 0.0,
            height: 0.0,
            fill: None,
            stroke: None,
            stroke_weight: 1.0,
            path: None,
            characters: String::new(),
            font: FontName::default(),
            font_size: 12.0,
            tags: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}

/// A page held in memory. Newly created nodes are detached until appended.
#[derive(Debug, Default)]
pub struct MemoryCanvas {
    next_id: u64,
    nodes: BTreeMap<NodeHandle, MemoryNode>,
    page: Vec<NodeHandle>,
    selection: Vec<NodeHandle>,
    viewport: Option<(f64, f64, f64, f64)>,
    missing_fonts: HashSet<String>,
    rejected_names: HashSet<String>,
}

impl MemoryCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `load_font` for this family.
    pub fn with_missing_font(mut self, family: &str) -> Self {
        self.missing_fonts.insert(family.to_string());
        self
    }

    /// Fail node creation for this name.
    pub fn with_rejected_name(mut self, name: &str) -> Self {
        self.rejected_names.insert(name.to_string());
        self
    }

    /// Add untagged user content at the page root.
    pub fn add_user_node(&mut self, node_type: MemoryNodeType, name: &str) -> NodeHandle {
        let handle = self.insert(MemoryNode::new(node_type, name, 0.0, 0.0));
        self.page.push(handle);
        handle
    }

    pub fn node(&self, handle: NodeHandle) -> Option<&MemoryNode> {
        self.nodes.get(&handle)
    }

    pub fn page_children(&self) -> &[NodeHandle] {
        &self.page
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn selection(&self) -> &[NodeHandle] {
        &self.selection
    }

    /// Bounding box `(x, y, width, height)` of the last focus call
    pub fn viewport(&self) -> Option<(f64, f64, f64, f64)> {
        self.viewport
    }

    /// Page coordinates of a node (sum of ancestor offsets)
    pub fn absolute_position(&self, handle: NodeHandle) -> Option<(f64, f64)> {
        let mut node = self.nodes.get(&handle)?;
        let (mut x, mut y) = (node.x, node.y);
        while let Some(parent) = node.parent.and_then(|p| self.nodes.get(&p)) {
            x += parent.x;
            y += parent.y;
            node = parent;
        }
        Some((x, y))
    }

    /// Indented outline of the page
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        for handle in &self.page {
            self.render_node(*handle, 0, &mut out);
        }
        out
    }

    fn render_node(&self, handle: NodeHandle, depth: usize, out: &mut String) {
        let Some(node) = self.nodes.get(&handle) else { return };
        let _ = writeln!(
            out,
            "{}{:?} \"{}\" at ({}, {}) {}x{}",
            "  ".repeat(depth),
            node.node_type,
            node.name,
            node.x,
            node.y,
            node.width,
            node.height
        );
        for child in &node.children {
            self.render_node(*child, depth + 1, out);
        }
    }

    fn insert(&mut self, node: MemoryNode) -> NodeHandle {
        self.next_id += 1;
        let handle = NodeHandle(self.next_id);
        self.nodes.insert(handle, node);
        handle
    }

    fn node_mut(&mut self, handle: NodeHandle) -> Result<&mut MemoryNode, CanvasError> {
        self.nodes
            .get_mut(&handle)
            .ok_or(CanvasError::NodeNotFound(handle.0))
    }

    fn check_name(&self, kind: &'static str, name: &str) -> Result<(), CanvasError> {
        if self.rejected_names.contains(name) {
            return Err(CanvasError::TargetCreation {
                kind,
                name: name.to_string(),
                reason: "rejected by canvas".to_string(),
            });
        }
        Ok(())
    }

    fn detach(&mut self, handle: NodeHandle) {
        let parent = self.nodes.get(&handle).and_then(|n| n.parent);
        match parent.and_then(|p| self.nodes.get_mut(&p)) {
            Some(p) => p.children.retain(|c| *c != handle),
            None => self.page.retain(|c| *c != handle),
        }
        if let Some(node) = self.nodes.get_mut(&handle) {
            node.parent = None;
        }
    }
}

#[async_trait]
impl Canvas for MemoryCanvas {
    fn find_tagged(&self, key: &str, value: &str) -> Vec<NodeHandle> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeHandle> = self.page.iter().rev().copied().collect();
        while let Some(handle) = stack.pop() {
            if let Some(node) = self.nodes.get(&handle) {
                if node.tags.get(key).map(String::as_str) == Some(value) {
                    found.push(handle);
                }
                stack.extend(node.children.iter().rev());
            }
        }
        found
    }

    fn remove(&mut self, node: NodeHandle) -> Result<(), CanvasError> {
        if !self.nodes.contains_key(&node) {
            return Ok(());
        }
        self.detach(node);
        let mut stack = vec![node];
        while let Some(handle) = stack.pop() {
            if let Some(removed) = self.nodes.remove(&handle) {
                stack.extend(removed.children);
            }
        }
        self.selection.retain(|h| *h != node);
        Ok(())
    }

    fn set_tag(&mut self, node: NodeHandle, key: &str, value: &str) -> Result<(), CanvasError> {
        self.node_mut(node)?
            .tags
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn create_frame(&mut self, props: &FrameProps<'_>) -> Result<NodeHandle, CanvasError> {
        self.check_name("frame", props.name)?;
        let mut node = MemoryNode::new(MemoryNodeType::Frame, props.name, props.x, props.y);
        node.width = props.width;
        node.height = props.height;
        node.fill = Some(props.fill);
        Ok(self.insert(node))
    }

    fn create_vector(&mut self, props: &VectorProps<'_>) -> Result<NodeHandle, CanvasError> {
        self.check_name("vector", props.name)?;
        let mut node = MemoryNode::new(MemoryNodeType::Vector, props.name, props.x, props.y);
        node.width = props.width;
        node.height = props.height;
        node.stroke = Some(props.stroke);
        node.stroke_weight = props.stroke_weight;
        node.path = Some(props.path.clone());
        Ok(self.insert(node))
    }

    fn create_text(&mut self, name: &str, x: f64, y: f64) -> Result<NodeHandle, CanvasError> {
        self.check_name("text", name)?;
        Ok(self.insert(MemoryNode::new(MemoryNodeType::Text, name, x, y)))
    }

    async fn load_font(&mut self, font: &FontName) -> Result<(), CanvasError> {
        tokio::task::yield_now().await;
        if self.missing_fonts.contains(&font.family) {
            return Err(CanvasError::FontLoad {
                family: font.family.clone(),
                style: font.style.clone(),
                reason: "font not installed".to_string(),
            });
        }
        Ok(())
    }

    fn set_text(&mut self, node: NodeHandle, props: &TextProps<'_>) -> Result<(), CanvasError> {
        let node = self.node_mut(node)?;
        node.characters = props.characters.to_string();
        if let Some(font) = props.font {
            node.font = font.clone();
        }
        node.font_size = props.font_size;
        node.fill = Some(props.fill);
        Ok(())
    }

    fn append_child(&mut self, parent: Option<NodeHandle>, child: NodeHandle) -> Result<(), CanvasError> {
        self.node_mut(child)?;
        if let Some(p) = parent {
            self.node_mut(p)?;
        }
        self.detach(child);
        match parent {
            Some(p) => {
                self.node_mut(p)?.children.push(child);
                self.node_mut(child)?.parent = Some(p);
            }
            None => self.page.push(child),
        }
        Ok(())
    }

    fn insert_page_child(&mut self, index: usize, child: NodeHandle) -> Result<(), CanvasError> {
        self.node_mut(child)?;
        self.detach(child);
        let index = index.min(self.page.len());
        self.page.insert(index, child);
        Ok(())
    }

    fn set_position(&mut self, node: NodeHandle, x: f64, y: f64) -> Result<(), CanvasError> {
        let node = self.node_mut(node)?;
        node.x = x;
        node.y = y;
        Ok(())
    }

    fn select_and_focus(&mut self, nodes: &[NodeHandle]) {
        self.selection = nodes.to_vec();

        let mut bounds: Option<(f64, f64, f64, f64)> = None;
        for handle in nodes {
            let (Some((x, y)), Some(node)) = (self.absolute_position(*handle), self.nodes.get(handle))
            else {
                continue;
            };
            let (x1, y1) = (x + node.width, y + node.height);
            bounds = Some(match bounds {
                Some((bx0, by0, bx1, by1)) => (bx0.min(x), by0.min(y), bx1.max(x1), by1.max(y1)),
                None => (x, y, x1, y1),
            });
        }
        self.viewport = bounds.map(|(x0, y0, x1, y1)| (x0, y0, x1 - x0, y1 - y0));
    }
}
