use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Unit pixel offset of the view center for a nudge in this direction.
    pub fn unit(self) -> (f64, f64) {
        match self {
            Direction::Up => (0.0, -1.0),
            Direction::Down => (0.0, 1.0),
            Direction::Left => (-1.0, 0.0),
            Direction::Right => (1.0, 0.0),
        }
    }
}

/// Input already reduced from raw pointer, keyboard and window events.
///
/// Pointer deltas are cumulative since [`InputEvent::PanStart`], in output
/// pixels; `elapsed` is the time since the gesture began.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PanStart { x: f64, y: f64 },
    PanMove { dx: f64, dy: f64, elapsed: Duration },
    PanEnd { dx: f64, dy: f64, elapsed: Duration },
    /// Pan by a pixel delta in one step.
    PanBy { dx: f64, dy: f64 },
    /// Zoom in about a pixel anchor by the click factor.
    ZoomAt { x: f64, y: f64 },
    ZoomIn,
    ZoomOut,
    IterationsUp,
    IterationsDown,
    Nudge(Direction),
    Reset,
    Resize { width: u32, height: u32 },
}

/// One step of a scripted session: an input event or a history move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptStep {
    Input(InputEvent),
    /// A press-move-release gesture with the given total delta.
    Drag { dx: f64, dy: f64 },
    Back,
    Forward,
}

fn pair<T: FromStr>(spec: &str, args: &str, sep: char) -> Result<(T, T), AppError> {
    let invalid = |reason: &str| AppError::InvalidEvent {
        spec: spec.to_string(),
        reason: reason.to_string(),
    };
    let (a, b) = args
        .split_once(sep)
        .ok_or_else(|| invalid(&format!("expected two values separated by `{sep}`")))?;
    let a = a.trim().parse().map_err(|_| invalid("not a number"))?;
    let b = b.trim().parse().map_err(|_| invalid("not a number"))?;
    Ok((a, b))
}

impl FromStr for ScriptStep {
    type Err = AppError;

    /// Parse `zoom:X,Y`, `drag:DX,DY`, `pan:DX,DY`, `resize:WxH` or one of
    /// the bare keywords (`in`, `out`, `iter+`, `iter-`, `up`, `down`,
    /// `left`, `right`, `reset`, `back`, `forward`).
    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let spec = spec.trim();
        let step = match spec.split_once(':') {
            Some(("zoom", args)) => {
                let (x, y) = pair(spec, args, ',')?;
                ScriptStep::Input(InputEvent::ZoomAt { x, y })
            }
            Some(("drag", args)) => {
                let (dx, dy) = pair(spec, args, ',')?;
                ScriptStep::Drag { dx, dy }
            }
            Some(("pan", args)) => {
                let (dx, dy) = pair(spec, args, ',')?;
                ScriptStep::Input(InputEvent::PanBy { dx, dy })
            }
            Some(("resize", args)) => {
                let (width, height) = pair(spec, args, 'x')?;
                ScriptStep::Input(InputEvent::Resize { width, height })
            }
            Some(_) => {
                return Err(AppError::InvalidEvent {
                    spec: spec.to_string(),
                    reason: "unknown event".to_string(),
                })
            }
            None => match spec {
                "in" => ScriptStep::Input(InputEvent::ZoomIn),
                "out" => ScriptStep::Input(InputEvent::ZoomOut),
                "iter+" => ScriptStep::Input(InputEvent::IterationsUp),
                "iter-" => ScriptStep::Input(InputEvent::IterationsDown),
                "up" => ScriptStep::Input(InputEvent::Nudge(Direction::Up)),
                "down" => ScriptStep::Input(InputEvent::Nudge(Direction::Down)),
                "left" => ScriptStep::Input(InputEvent::Nudge(Direction::Left)),
                "right" => ScriptStep::Input(InputEvent::Nudge(Direction::Right)),
                "reset" => ScriptStep::Input(InputEvent::Reset),
                "back" => ScriptStep::Back,
                "forward" => ScriptStep::Forward,
                _ => {
                    return Err(AppError::InvalidEvent {
                        spec: spec.to_string(),
                        reason: "unknown event".to_string(),
                    })
                }
            },
        };
        Ok(step)
    }
}
