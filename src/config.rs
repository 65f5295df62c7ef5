/**
 * Mission configuration
 *
 * TOML file with every field optional; anything left out falls back to
 * the defaults below. The resolved config is validated once on load.
 */

use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::Deserialize;
use thiserror::Error;

use crate::control::{ConvergencePolicy, MissedFramePolicy, RetryPolicy, ServoConfig};
use crate::geometry::{FrameSize, GeometryError};
use crate::mission::{CenteringTask, FailurePolicy, MissionSequencer};

const DEFAULT_PORT: &str = "/dev/ttyACM0";
const DEFAULT_BAUD: u32 = 9600;
const DEFAULT_DEPTH_KP: f32 = 60.0;
const DEFAULT_DEPTH_MAX_HEAVE: f32 = 40.0;
const DEFAULT_POLL_MS: u64 = 100;
const DEFAULT_ACQUISITION_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_CENTERING_TIMEOUT_MS: u64 = 120_000;
const DEFAULT_TASK_MODEL: &str = "coke";
const DEFAULT_TASK_DEPTH: f32 = 0.3;

#[derive(Debug, Error)]
pub enum ConfigError{
    #[error("cannot read config {path}: {source}")]
    Io{
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct MissionConfigFile{
    link: Option<LinkConfigFile>,
    camera: Option<CameraConfigFile>,
    servo: Option<ServoConfigFile>,
    mission: Option<MissionSectionFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct LinkConfigFile{
    port: Option<String>,
    baud: Option<u32>,
    depth_kp: Option<f32>,
    depth_max_heave: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CameraConfigFile{
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ServoConfigFile{
    threshold: Option<f64>,
    poll_interval_ms: Option<u64>,
    discount_factor: Option<f64>,
    gain: Option<f32>,
    max_command: Option<f32>,
    surface_margin: Option<f32>,
    convergence: Option<ConvergencePolicy>,
    missed_frame: Option<MissedFramePolicy>,
    acquisition_timeout_ms: Option<u64>,
    acquisition_max_attempts: Option<u32>,
    centering_timeout_ms: Option<u64>,
    centering_max_attempts: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct MissionSectionFile{
    on_failure: Option<FailurePolicy>,
    tasks: Option<Vec<TaskConfigFile>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TaskConfigFile{
    name: Option<String>,
    kind: TaskKind,
    model: String,
    depth: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind{
    Centering,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkSettings{
    pub port: String,
    pub baud: u32,
    pub depth_kp: f32,
    pub depth_max_heave: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskSettings{
    pub name: String,
    pub kind: TaskKind,
    pub model: String,
    /// Depth-hold setpoint to settle at before the task starts
    pub depth: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct MissionConfig{
    pub link: LinkSettings,
    pub servo: ServoConfig,
    pub on_failure: FailurePolicy,
    pub tasks: Vec<TaskSettings>,
}

impl MissionConfig{
    pub fn load(path: &Path) -> Result<Self, ConfigError>{
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io{ path: path.to_path_buf(), source })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError>{
        let file: MissionConfigFile = toml::from_str(text)?;
        Self::from_file(file)
    }

    fn from_file(file: MissionConfigFile) -> Result<Self, ConfigError>{
        let link_file = file.link.unwrap_or_default();
        let link = LinkSettings{
            port: link_file.port.unwrap_or_else(|| DEFAULT_PORT.to_string()),
            baud: link_file.baud.unwrap_or(DEFAULT_BAUD),
            depth_kp: link_file.depth_kp.unwrap_or(DEFAULT_DEPTH_KP),
            depth_max_heave: link_file.depth_max_heave.unwrap_or(DEFAULT_DEPTH_MAX_HEAVE),
        };

        let camera = file.camera.unwrap_or_default();
        let defaults = FrameSize::default();
        let frame = FrameSize::new(
            camera.width.map_or(defaults.width(), f64::from),
            camera.height.map_or(defaults.height(), f64::from),
        )?;

        let servo = resolve_servo(file.servo.unwrap_or_default(), frame);

        let section = file.mission.unwrap_or_default();
        let tasks = match section.tasks{
            Some(tasks) => tasks
                .into_iter()
                .map(|t| TaskSettings{
                    name: t.name.unwrap_or_else(|| t.model.clone()),
                    kind: t.kind,
                    model: t.model,
                    depth: t.depth,
                })
                .collect(),
            None => vec![TaskSettings{
                name: DEFAULT_TASK_MODEL.to_string(),
                kind: TaskKind::Centering,
                model: DEFAULT_TASK_MODEL.to_string(),
                depth: Some(DEFAULT_TASK_DEPTH),
            }],
        };

        let cfg = MissionConfig{
            link,
            servo,
            on_failure: section.on_failure.unwrap_or_default(),
            tasks,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError>{
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if self.link.port.trim().is_empty(){
            return invalid("link.port must not be empty".into());
        }
        if self.link.baud == 0{
            return invalid("link.baud must be positive".into());
        }
        if !(self.servo.threshold >= 0.0){
            return invalid(format!("servo.threshold must be >= 0, got {}", self.servo.threshold));
        }
        if !self.servo.discount_factor.is_finite(){
            return invalid("servo.discount_factor must be finite".into());
        }
        if !(self.servo.max_command > 0.0){
            return invalid("servo.max_command must be positive".into());
        }
        if !self.servo.gain.is_finite(){
            return invalid(format!("servo.gain must be finite, got {}", self.servo.gain));
        }
        if !self.servo.surface_margin.is_finite(){
            return invalid(format!("servo.surface_margin must be finite, got {}", self.servo.surface_margin));
        }
        for (name, policy) in [("acquisition", &self.servo.acquisition), ("centering", &self.servo.centering)]{
            if policy.poll_interval.is_zero(){
                return invalid(format!("{} poll interval must be at least 1 ms", name));
            }
        }
        if self.tasks.is_empty(){
            return invalid("mission.tasks must name at least one task".into());
        }
        for task in &self.tasks{
            if task.model.trim().is_empty(){
                return invalid(format!("task '{}' has an empty model", task.name));
            }
            if let Some(depth) = task.depth{
                if !depth.is_finite() || depth < 0.0{
                    return invalid(format!("task '{}' depth {} is not a valid setpoint", task.name, depth));
                }
            }
        }
        Ok(())
    }

    pub fn build_sequencer(&self) -> MissionSequencer{
        let mut seq = MissionSequencer::new(self.on_failure);
        for task in &self.tasks{
            match task.kind{
                TaskKind::Centering => {
                    let mut centering = CenteringTask::new(&task.model, self.servo.clone());
                    if let Some(depth) = task.depth{
                        centering = centering.with_depth_hold(depth);
                    }
                    seq.push(&task.name, Box::new(centering));
                }
            }
        }
        seq
    }
}

fn resolve_servo(file: ServoConfigFile, frame: FrameSize) -> ServoConfig{
    let defaults = ServoConfig::default();
    let poll = Duration::from_millis(file.poll_interval_ms.unwrap_or(DEFAULT_POLL_MS));
    let retry = |timeout_ms: Option<u64>, default_ms: u64, max_attempts: Option<u32>| RetryPolicy{
        poll_interval: poll,
        // 0 disables the time limit
        timeout: match timeout_ms.unwrap_or(default_ms){
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        },
        max_attempts,
    };

    ServoConfig{
        frame,
        threshold: file.threshold.unwrap_or(defaults.threshold),
        discount_factor: file.discount_factor.unwrap_or(defaults.discount_factor),
        gain: file.gain.unwrap_or(defaults.gain),
        max_command: file.max_command.unwrap_or(defaults.max_command),
        surface_margin: file.surface_margin.unwrap_or(defaults.surface_margin),
        convergence: file.convergence.unwrap_or_default(),
        missed_frame: file.missed_frame.unwrap_or_default(),
        acquisition: retry(
            file.acquisition_timeout_ms,
            DEFAULT_ACQUISITION_TIMEOUT_MS,
            file.acquisition_max_attempts,
        ),
        centering: retry(
            file.centering_timeout_ms,
            DEFAULT_CENTERING_TIMEOUT_MS,
            file.centering_max_attempts,
        ),
    }
}

#[cfg(test)]
mod tests{
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_gives_defaults(){
        let cfg = MissionConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.link.port, DEFAULT_PORT);
        assert_eq!(cfg.link.baud, 9600);
        assert_eq!(cfg.servo.frame, FrameSize::new(480.0, 480.0).unwrap());
        assert_eq!(cfg.servo.threshold, 0.2);
        assert_eq!(cfg.servo.acquisition.poll_interval, Duration::from_millis(100));
        assert_eq!(cfg.servo.acquisition.timeout, Some(Duration::from_secs(60)));
        assert_eq!(cfg.on_failure, FailurePolicy::Halt);
        assert_eq!(cfg.tasks.len(), 1);
        assert_eq!(cfg.tasks[0].depth, Some(0.3));
    }

    #[test]
    fn test_full_file(){
        let cfg = MissionConfig::from_toml_str(r#"
            [link]
            port = "/dev/ttyUSB1"
            baud = 115200

            [camera]
            width = 640
            height = 480

            [servo]
            threshold = 0.1
            poll_interval_ms = 50
            discount_factor = 0.6
            convergence = "either_axis"
            missed_frame = "hold_last"
            acquisition_timeout_ms = 0
            centering_max_attempts = 300

            [mission]
            on_failure = "continue"

            [[mission.tasks]]
            name = "gate marker"
            kind = "centering"
            model = "gate"

            [[mission.tasks]]
            kind = "centering"
            model = "bucket"
            depth = 1.2
        "#).unwrap();

        assert_eq!(cfg.link.port, "/dev/ttyUSB1");
        assert_eq!(cfg.link.baud, 115200);
        assert_eq!(cfg.servo.frame.width(), 640.0);
        assert_eq!(cfg.servo.discount_factor, 0.6);
        assert_eq!(cfg.servo.convergence, ConvergencePolicy::EitherAxis);
        assert_eq!(cfg.servo.missed_frame, MissedFramePolicy::HoldLast);
        assert!(cfg.servo.acquisition.timeout.is_none());
        assert_eq!(cfg.servo.centering.max_attempts, Some(300));
        assert_eq!(cfg.servo.centering.poll_interval, Duration::from_millis(50));
        assert_eq!(cfg.on_failure, FailurePolicy::Continue);
        assert_eq!(cfg.tasks[0].name, "gate marker");
        assert_eq!(cfg.tasks[1].name, "bucket");
        assert_eq!(cfg.tasks[1].depth, Some(1.2));

        let seq = cfg.build_sequencer();
        assert_eq!(seq.task_names().collect::<Vec<_>>(), vec!["gate marker", "bucket"]);
    }

    #[test]
    fn test_rejects_zero_camera_size(){
        let err = MissionConfig::from_toml_str("[camera]\nwidth = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Geometry(GeometryError::InvalidDimension{ .. })));
    }

    #[test]
    fn test_rejects_empty_task_list(){
        let err = MissionConfig::from_toml_str("[mission]\ntasks = []\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_negative_depth_and_unknown_keys(){
        let bad_depth = "[[mission.tasks]]\nkind = \"centering\"\nmodel = \"coke\"\ndepth = -2.0\n";
        assert!(matches!(MissionConfig::from_toml_str(bad_depth), Err(ConfigError::Invalid(_))));
        assert!(matches!(MissionConfig::from_toml_str("[servo]\nthreshhold = 0.3\n"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            MissionConfig::from_toml_str("[[mission.tasks]]\nkind = \"gate\"\nmodel = \"gate\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_rejects_zero_poll_interval(){
        let err = MissionConfig::from_toml_str("[servo]\npoll_interval_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains("poll interval")));
        assert!(MissionConfig::from_toml_str("[servo]\npoll_interval_ms = 1\n").is_ok());
    }

    #[test]
    fn test_rejects_non_finite_gain(){
        for text in ["[servo]\ngain = nan\n", "[servo]\ngain = inf\n"]{
            let err = MissionConfig::from_toml_str(text).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains("servo.gain")));
        }
    }

    #[test]
    fn test_rejects_non_finite_surface_margin(){
        let err = MissionConfig::from_toml_str("[servo]\nsurface_margin = -inf\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains("surface_margin")));
    }

    #[test]
    fn test_load_from_path(){
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[link]\nport = \"/dev/ttyS0\"").unwrap();
        let cfg = MissionConfig::load(file.path()).unwrap();
        assert_eq!(cfg.link.port, "/dev/ttyS0");

        let missing = MissionConfig::load(Path::new("/nonexistent/auv-mission.toml"));
        assert!(matches!(missing, Err(ConfigError::Io{ .. })));
    }

    #[test]
    fn test_defaults_build_one_task(){
        let cfg = MissionConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.build_sequencer().len(), 1);
    }
}
