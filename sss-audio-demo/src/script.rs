//! Line-oriented script adapter
//!
//! One command per line, `#` starts a comment. Each command maps onto a
//! single call of the library API; the adapter keeps no state of its own.
//!
//! ```text
//! Buffer.loadFile 0 clip.wav
//! Source.create 0
//! Source.useBuffer 0 0
//! Source.play 0
//! Audio.status
//! ```

use std::io::BufRead;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use sss_audio::{AudioError, Device, VirtualBackend};
use thiserror::Error;
use tracing::{debug, error, warn};

/// Errors from parsing a script line
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("{command}: missing argument <{argument}>")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("{command}: invalid value '{value}'")]
    InvalidValue { command: &'static str, value: String },
}

/// One parsed script command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BufferCreate(Option<u32>),
    BufferLoadFile(u32, PathBuf),
    BufferRemove(u32),
    BufferClearAll,
    SourceCreate(Option<u32>),
    SourceRemove(u32),
    SourceClearAll,
    SourceUseBuffer(u32, u32),
    SourceQueueBuffers(u32, Vec<u32>),
    SourceDetachBuffers(u32),
    SourcePlay(u32),
    SourcePause(u32),
    SourceStop(u32),
    SourceVolume(u32, Option<i32>),
    SourceLoop(u32, Option<bool>),
    AudioGetDevices,
    AudioGetDevice,
    AudioSetDevice(String),
    AudioGetVolume,
    AudioSetVolume(i32),
    AudioStatus,
    AudioAdvance(u32, usize),
}

const COMMANDS: &[&str] = &[
    "Buffer.create",
    "Buffer.loadFile",
    "Buffer.remove",
    "Buffer.clearAll",
    "Source.create",
    "Source.remove",
    "Source.clearAll",
    "Source.useBuffer",
    "Source.queueBuffers",
    "Source.detachBuffers",
    "Source.play",
    "Source.pause",
    "Source.stop",
    "Source.volume",
    "Source.loop",
    "Audio.getDevices",
    "Audio.getDevice",
    "Audio.setDevice",
    "Audio.getVolume",
    "Audio.setVolume",
    "Audio.status",
    "Audio.advance",
];

/// Pulls typed arguments off a whitespace-split line
struct Args<'a> {
    command: &'static str,
    words: std::str::SplitWhitespace<'a>,
}

impl<'a> Args<'a> {
    fn optional<T: FromStr>(&mut self) -> Result<Option<T>, ParseError> {
        self.words
            .next()
            .map(|word| {
                word.parse().map_err(|_| ParseError::InvalidValue {
                    command: self.command,
                    value: word.to_string(),
                })
            })
            .transpose()
    }

    fn required<T: FromStr>(&mut self, argument: &'static str) -> Result<T, ParseError> {
        self.optional()?.ok_or(ParseError::MissingArgument {
            command: self.command,
            argument,
        })
    }

    /// Rest of the line, for names that may contain spaces
    fn rest(&mut self, argument: &'static str) -> Result<String, ParseError> {
        let rest = self.words.by_ref().collect::<Vec<_>>().join(" ");
        if rest.is_empty() {
            return Err(ParseError::MissingArgument {
                command: self.command,
                argument,
            });
        }
        Ok(rest)
    }

    fn all<T: FromStr>(&mut self) -> Result<Vec<T>, ParseError> {
        std::iter::from_fn(|| self.optional().transpose()).collect()
    }
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let name = words.next().unwrap_or_default();
        let command = COMMANDS
            .iter()
            .copied()
            .find(|known| *known == name)
            .ok_or_else(|| ParseError::UnknownCommand(name.to_string()))?;
        let mut args = Args { command, words };

        let parsed = match command {
            "Buffer.create" => Command::BufferCreate(args.optional()?),
            "Buffer.loadFile" => {
                Command::BufferLoadFile(args.required("id")?, PathBuf::from(args.rest("path")?))
            }
            "Buffer.remove" => Command::BufferRemove(args.required("id")?),
            "Buffer.clearAll" => Command::BufferClearAll,
            "Source.create" => Command::SourceCreate(args.optional()?),
            "Source.remove" => Command::SourceRemove(args.required("id")?),
            "Source.clearAll" => Command::SourceClearAll,
            "Source.useBuffer" => {
                Command::SourceUseBuffer(args.required("id")?, args.required("buffer")?)
            }
            "Source.queueBuffers" => {
                Command::SourceQueueBuffers(args.required("id")?, args.all()?)
            }
            "Source.detachBuffers" => Command::SourceDetachBuffers(args.required("id")?),
            "Source.play" => Command::SourcePlay(args.required("id")?),
            "Source.pause" => Command::SourcePause(args.required("id")?),
            "Source.stop" => Command::SourceStop(args.required("id")?),
            "Source.volume" => Command::SourceVolume(args.required("id")?, args.optional()?),
            "Source.loop" => Command::SourceLoop(args.required("id")?, args.optional()?),
            "Audio.getDevices" => Command::AudioGetDevices,
            "Audio.getDevice" => Command::AudioGetDevice,
            "Audio.setDevice" => Command::AudioSetDevice(args.rest("name")?),
            "Audio.getVolume" => Command::AudioGetVolume,
            "Audio.setVolume" => Command::AudioSetVolume(args.required("volume")?),
            "Audio.status" => Command::AudioStatus,
            "Audio.advance" => {
                Command::AudioAdvance(args.required("source")?, args.required("bytes")?)
            }
            _ => return Err(ParseError::UnknownCommand(name.to_string())),
        };
        Ok(parsed)
    }
}

/// Outcome counts of a script run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub executed: usize,
    pub failed: usize,
}

/// Execute one command, returning any text it produces
pub fn execute(
    device: &mut Device<VirtualBackend>,
    command: &Command,
) -> Result<Option<String>, AudioError> {
    let output = match command {
        Command::BufferCreate(id) => {
            let mut buffers = device.buffers()?;
            let buffer = match id {
                Some(id) => buffers.create(*id)?,
                None => buffers.create_auto()?,
            };
            Some(buffer.id().to_string())
        }
        Command::BufferLoadFile(id, path) => {
            let mut buffers = device.buffers()?;
            if buffers.get(*id).is_some() {
                buffers.load(*id, path)?;
            } else {
                buffers.create_from_file(Some(*id), path)?;
            }
            None
        }
        Command::BufferRemove(id) => {
            device.buffers()?.remove(*id);
            None
        }
        Command::BufferClearAll => {
            device.buffers()?.clear_all();
            None
        }
        Command::SourceCreate(id) => {
            let mut sources = device.sources()?;
            let source = match id {
                Some(id) => sources.create(*id)?,
                None => sources.create_auto()?,
            };
            Some(source.id().to_string())
        }
        Command::SourceRemove(id) => {
            device.sources()?.remove(*id);
            None
        }
        Command::SourceClearAll => {
            device.sources()?.clear_all();
            None
        }
        Command::SourceUseBuffer(id, buffer) => {
            device.sources()?.control(*id).use_buffer(*buffer)?;
            None
        }
        Command::SourceQueueBuffers(id, buffers) => {
            device.sources()?.control(*id).queue_buffers(buffers)?;
            None
        }
        Command::SourceDetachBuffers(id) => {
            device.sources()?.control(*id).detach_buffers()?;
            None
        }
        Command::SourcePlay(id) => {
            device.sources()?.control(*id).play()?;
            None
        }
        Command::SourcePause(id) => {
            device.sources()?.control(*id).pause()?;
            None
        }
        Command::SourceStop(id) => {
            device.sources()?.control(*id).stop()?;
            None
        }
        Command::SourceVolume(id, volume) => {
            let mut sources = device.sources()?;
            let mut source = sources.control(*id);
            match volume {
                Some(volume) => {
                    source.set_volume(*volume)?;
                    None
                }
                None => Some(source.volume().to_string()),
            }
        }
        Command::SourceLoop(id, enable) => {
            let mut sources = device.sources()?;
            let mut source = sources.control(*id);
            match enable {
                Some(enable) => {
                    source.set_looping(*enable)?;
                    None
                }
                None => Some(source.looping().to_string()),
            }
        }
        Command::AudioGetDevices => Some(device.list_endpoints().join("\n")),
        Command::AudioGetDevice => {
            device.ensure_initialized()?;
            device.current_endpoint().map(str::to_string)
        }
        Command::AudioSetDevice(name) => {
            device.select_endpoint(name)?;
            None
        }
        Command::AudioGetVolume => Some(device.master_volume()?.to_string()),
        Command::AudioSetVolume(volume) => {
            device.set_master_volume(*volume)?;
            None
        }
        Command::AudioStatus => {
            let status = device.status()?;
            Some(
                serde_json::to_string_pretty(&status)
                    .unwrap_or_else(|e| format!("status unavailable: {}", e)),
            )
        }
        Command::AudioAdvance(source, bytes) => {
            let state = device.advance(*source, *bytes)?;
            Some(format!("{:?}", state))
        }
    };
    Ok(output)
}

/// Run every line of `reader`, printing command output to stdout.
///
/// Parse errors and recoverable failures are logged and skipped; a fatal
/// device error aborts the run.
pub fn run_script<R: BufRead>(
    device: &mut Device<VirtualBackend>,
    reader: R,
) -> anyhow::Result<RunSummary> {
    let mut summary = RunSummary::default();

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.with_context(|| format!("Failed to read script line {}", line_number))?;
        let line = line.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                warn!("line {}: {}", line_number, e);
                summary.failed += 1;
                continue;
            }
        };

        debug!("line {}: {:?}", line_number, command);
        summary.executed += 1;
        match execute(device, &command) {
            Ok(Some(output)) => println!("{}", output),
            Ok(None) => {}
            Err(e) if e.is_fatal() => {
                return Err(e).with_context(|| format!("Fatal error on line {}", line_number));
            }
            Err(e) => {
                error!("line {}: {}", line_number, e);
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}
