//! Tool system: turns pointer input into committed board actions.

use crate::canvas::CanvasState;
use crate::input::PointerEvent;
use crate::shapes::{Annotation, Shape, Stroke};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Color selected when a session starts.
pub const DEFAULT_TOOL_COLOR: &str = "black";

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// Freehand drawing.
    #[default]
    Pen,
    /// Place an annotation box.
    Story,
    /// Select and drag shapes.
    Move,
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ToolKind::Pen => "pen",
            ToolKind::Story => "story",
            ToolKind::Move => "move",
        })
    }
}

impl FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pen" => Ok(ToolKind::Pen),
            "story" => Ok(ToolKind::Story),
            "move" => Ok(ToolKind::Move),
            other => Err(format!("unknown tool: {other}")),
        }
    }
}

/// State of the local interaction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InteractionState {
    /// Waiting for a pointer press.
    #[default]
    Idle,
    /// Pen held down; `last` is the end of the previously committed segment.
    Drawing { last: Point },
    /// Selected shape held down by the move tool.
    Dragging {
        origin_offset: Vec2,
        endpoint_offset: Vec2,
    },
}

/// Result of feeding one pointer event through the tool manager.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// A new shape was committed (device pixels). Caller appends and emits it.
    Commit(Shape),
    /// A drag ended; the selected shape was moved in place.
    MoveFinished,
}

/// Manages the current tool, color and interaction state.
#[derive(Debug, Clone)]
pub struct ToolManager {
    /// Currently selected tool.
    pub current_tool: ToolKind,
    /// Color applied to new shapes.
    pub current_color: String,
    state: InteractionState,
}

impl Default for ToolManager {
    fn default() -> Self {
        Self {
            current_tool: ToolKind::default(),
            current_color: DEFAULT_TOOL_COLOR.to_string(),
            state: InteractionState::Idle,
        }
    }
}

impl ToolManager {
    /// Create a new tool manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch tool. Any gesture in progress is abandoned without committing.
    pub fn set_tool(&mut self, tool: ToolKind) {
        self.current_tool = tool;
        self.state = InteractionState::Idle;
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.current_color = color.into();
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    /// Check if a gesture is in progress.
    pub fn is_active(&self) -> bool {
        !matches!(self.state, InteractionState::Idle)
    }

    /// Feed one pointer event.
    pub fn handle(&mut self, event: PointerEvent, canvas: &mut CanvasState) -> Option<Action> {
        match event {
            PointerEvent::Down { position } => self.pointer_down(position, canvas),
            PointerEvent::Move { position } => self.pointer_move(position, canvas),
            PointerEvent::Up { position } | PointerEvent::Out { position } => {
                self.pointer_up(position, canvas)
            }
        }
    }

    /// Pointer pressed.
    pub fn pointer_down(&mut self, point: Point, canvas: &mut CanvasState) -> Option<Action> {
        match self.current_tool {
            ToolKind::Pen => {
                self.state = InteractionState::Drawing { last: point };
                None
            }
            ToolKind::Story => {
                self.state = InteractionState::Idle;
                let note = Annotation::new(point, self.current_color.clone());
                Some(Action::Commit(Shape::Annotation(note)))
            }
            ToolKind::Move => {
                match canvas.shape_at(point) {
                    Some(index) => {
                        let shape = &canvas.shapes()[index];
                        self.state = InteractionState::Dragging {
                            origin_offset: point - shape.origin(),
                            endpoint_offset: point - shape.endpoint(),
                        };
                        canvas.select(index);
                    }
                    None => {
                        self.state = InteractionState::Idle;
                        canvas.clear_selection();
                    }
                }
                None
            }
        }
    }

    /// Pointer moved (already throttled by the caller).
    pub fn pointer_move(&mut self, point: Point, canvas: &mut CanvasState) -> Option<Action> {
        match self.state {
            InteractionState::Idle => None,
            InteractionState::Drawing { last } => {
                self.state = InteractionState::Drawing { last: point };
                Some(self.commit_segment(last, point))
            }
            InteractionState::Dragging {
                origin_offset,
                endpoint_offset,
            } => {
                if let Some(shape) = canvas.selected_mut() {
                    shape.move_with_offsets(point, origin_offset, endpoint_offset);
                    canvas.mark_dirty();
                }
                None
            }
        }
    }

    /// Pointer released or left the canvas.
    pub fn pointer_up(&mut self, point: Point, _canvas: &mut CanvasState) -> Option<Action> {
        let previous = std::mem::take(&mut self.state);
        match previous {
            InteractionState::Idle => None,
            InteractionState::Drawing { last } => Some(self.commit_segment(last, point)),
            InteractionState::Dragging { .. } => Some(Action::MoveFinished),
        }
    }

    fn commit_segment(&self, from: Point, to: Point) -> Action {
        Action::Commit(Shape::Stroke(Stroke::new(from, to, self.current_color.clone())))
    }
}
