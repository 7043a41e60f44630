//! 控制门面
//!
//! UI 或命令行外壳通过 [`ControlFacade`] 驱动控制器：连接/断开、文本指令分发。
//! 门面本身不持有状态，全部状态都在 [`ArmController`] 中。

use feeder_client::{ArmController, ControllerError, ControllerStatus, OperationHandle};
use feeder_serial::SerialTransport;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// 交互指令帮助
pub const HELP: &str = "\
Commands:
  connect [port] [baud]   open the serial link (defaults from calibration)
  disconnect              close the serial link
  init                    move all servos to the rest pose
  feed                    single feed towards the detected mouth
  track                   start dynamic tracking
  untrack                 stop dynamic tracking (no re-centring)
  stop                    stop feeding and return to the rest pose
  set <id> <angle>        set one servo (id 1-4, angle 0-180)
  aim                     point servos 1 and 2 at the detection (absolute map)
  status                  show controller state
  help                    show this help";

/// 门面错误
#[derive(Error, Debug)]
pub enum FacadeError {
    /// 指令文本无法解析
    #[error("Cannot parse '{input}': {reason}")]
    Parse { input: String, reason: String },

    /// 当前构建不支持该操作
    #[error("Unsupported: {0}")]
    Unsupported(&'static str),

    #[error(transparent)]
    Controller(#[from] ControllerError),
}

/// 文本指令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacadeCommand {
    Connect {
        port: Option<String>,
        baud_rate: Option<u32>,
    },
    Disconnect,
    Init,
    Feed,
    Track,
    StopTracking,
    Stop,
    /// 原始整数，越界由控制器在发送前拒绝
    Set {
        servo_id: i64,
        angle: i64,
    },
    Aim,
    Status,
    Help,
}

impl FromStr for FacadeCommand {
    type Err = FacadeError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let parse_error = |reason: &str| FacadeError::Parse {
            input: input.trim().to_string(),
            reason: reason.to_string(),
        };

        let tokens: Vec<&str> = input.split_whitespace().collect();
        let Some((&name, args)) = tokens.split_first() else {
            return Err(parse_error("empty command"));
        };

        let no_args = |command: FacadeCommand| {
            if args.is_empty() {
                Ok(command)
            } else {
                Err(parse_error("unexpected arguments"))
            }
        };

        match name.to_ascii_lowercase().as_str() {
            "connect" => {
                if args.len() > 2 {
                    return Err(parse_error("usage: connect [port] [baud]"));
                }
                let baud_rate = match args.get(1) {
                    Some(raw) => Some(raw.parse().map_err(|_| parse_error("invalid baud rate"))?),
                    None => None,
                };
                Ok(FacadeCommand::Connect {
                    port: args.first().map(|p| p.to_string()),
                    baud_rate,
                })
            },
            "disconnect" => no_args(FacadeCommand::Disconnect),
            "init" => no_args(FacadeCommand::Init),
            "feed" => no_args(FacadeCommand::Feed),
            "track" => no_args(FacadeCommand::Track),
            "untrack" => no_args(FacadeCommand::StopTracking),
            "stop" => no_args(FacadeCommand::Stop),
            "aim" => no_args(FacadeCommand::Aim),
            "status" => no_args(FacadeCommand::Status),
            "help" | "?" => no_args(FacadeCommand::Help),
            "set" => {
                let [id, angle] = args else {
                    return Err(parse_error("usage: set <id> <angle>"));
                };
                Ok(FacadeCommand::Set {
                    servo_id: id.parse().map_err(|_| parse_error("servo id must be an integer"))?,
                    angle: angle.parse().map_err(|_| parse_error("angle must be an integer"))?,
                })
            },
            _ => Err(parse_error("unknown command, try 'help'")),
        }
    }
}

/// 指令执行结果
#[derive(Debug)]
pub enum FacadeReply {
    /// 已连接；开启自动初始化时附带初始化句柄
    Connected {
        port: String,
        init: Option<OperationHandle>,
    },
    /// 已断开（`false` 表示本来就未连接）
    Disconnected(bool),
    /// 操作已提交
    Submitted(OperationHandle),
    /// 已请求停止跟踪（`false` 表示当前不在跟踪）
    TrackingStopped(bool),
    Status(ControllerStatus),
    Help,
}

impl fmt::Display for FacadeReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacadeReply::Connected { port, init } => {
                write!(f, "Connected to {}", port)?;
                if init.is_some() {
                    write!(f, ", initializing servos")?;
                }
                Ok(())
            },
            FacadeReply::Disconnected(true) => f.write_str("Disconnected"),
            FacadeReply::Disconnected(false) => f.write_str("Not connected"),
            FacadeReply::Submitted(handle) => write!(f, "Submitted {}", handle.operation()),
            FacadeReply::TrackingStopped(true) => f.write_str("Stopping dynamic tracking"),
            FacadeReply::TrackingStopped(false) => f.write_str("Not tracking"),
            FacadeReply::Status(status) => {
                write!(
                    f,
                    "state={} port={} busy={} detection={}",
                    status.state,
                    status.port.as_deref().unwrap_or("-"),
                    status.busy,
                    if status.detection_running { "running" } else { "stopped" },
                )?;
                if status.detection.detected {
                    write!(
                        f,
                        " mouth=({}, {}) frame={}",
                        status.detection.center.0,
                        status.detection.center.1,
                        status.detection.frame_index
                    )?;
                }
                Ok(())
            },
            FacadeReply::Help => f.write_str(HELP),
        }
    }
}

/// 控制门面
#[derive(Clone)]
pub struct ControlFacade {
    controller: Arc<ArmController>,
    auto_init: bool,
}

impl ControlFacade {
    /// 包装控制器（默认连接后不自动初始化）
    pub fn new(controller: Arc<ArmController>) -> Self {
        Self {
            controller,
            auto_init: false,
        }
    }

    /// 连接成功后是否自动执行 `init_servos`
    pub fn with_auto_init(mut self, auto_init: bool) -> Self {
        self.auto_init = auto_init;
        self
    }

    /// 底层控制器
    pub fn controller(&self) -> &Arc<ArmController> {
        &self.controller
    }

    /// 打开串口
    ///
    /// # 参数
    /// - `port`: 端口路径，`None` 时使用标定配置中的默认端口
    /// - `baud_rate`: 波特率，`None` 时使用标定配置中的默认值
    ///
    /// # 错误
    /// - `FacadeError::Controller`: 连接失败或已连接
    /// - `FacadeError::Unsupported`: 未启用串口后端
    pub fn connect(
        &self,
        port: Option<&str>,
        baud_rate: Option<u32>,
    ) -> Result<FacadeReply, FacadeError> {
        let link = &self.controller.config().link;
        let port = port.unwrap_or(&link.port).to_string();
        let baud_rate = baud_rate.unwrap_or(link.baud_rate);

        #[cfg(feature = "native")]
        {
            self.controller.connect(&port, baud_rate)?;
            self.after_connect(port)
        }
        #[cfg(not(feature = "native"))]
        {
            let _ = (port, baud_rate);
            Err(FacadeError::Unsupported("serial backend disabled in this build"))
        }
    }

    /// 使用已打开的传输连接
    ///
    /// # 错误
    /// - `FacadeError::Controller`: 已连接或清空缓冲失败
    pub fn connect_with(
        &self,
        transport: Box<dyn SerialTransport>,
    ) -> Result<FacadeReply, FacadeError> {
        let port = transport.port_name().to_string();
        self.controller.connect_with(transport)?;
        self.after_connect(port)
    }

    fn after_connect(&self, port: String) -> Result<FacadeReply, FacadeError> {
        let init = if self.auto_init {
            info!("Auto-initializing servos after connect");
            Some(self.controller.init_servos()?)
        } else {
            None
        };
        Ok(FacadeReply::Connected { port, init })
    }

    /// 断开串口
    pub fn disconnect(&self) -> FacadeReply {
        FacadeReply::Disconnected(self.controller.disconnect())
    }

    /// 解析并执行一行文本指令
    ///
    /// 空行返回 `Ok(None)`。
    ///
    /// # 示例
    ///
    /// ```rust,no_run
    /// use feeder_sdk::{ArmController, ControlFacade};
    /// use std::sync::Arc;
    ///
    /// let controller = Arc::new(ArmController::builder().build()?);
    /// let facade = ControlFacade::new(controller).with_auto_init(true);
    /// facade.execute("connect /dev/ttyUSB0 115200")?;
    /// facade.execute("feed")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn execute(&self, line: &str) -> Result<Option<FacadeReply>, FacadeError> {
        if line.trim().is_empty() {
            return Ok(None);
        }
        let command: FacadeCommand = line.parse()?;
        self.dispatch(command).map(Some)
    }

    /// 执行已解析的指令
    ///
    /// # 错误
    /// - `FacadeError::Controller`: 控制器拒绝（未连接、忙、输入越界等）
    pub fn dispatch(&self, command: FacadeCommand) -> Result<FacadeReply, FacadeError> {
        let controller = &self.controller;
        match command {
            FacadeCommand::Connect { port, baud_rate } => self.connect(port.as_deref(), baud_rate),
            FacadeCommand::Disconnect => Ok(self.disconnect()),
            FacadeCommand::Init => Ok(FacadeReply::Submitted(controller.init_servos()?)),
            FacadeCommand::Feed => Ok(FacadeReply::Submitted(controller.start_single_feed()?)),
            FacadeCommand::Track => Ok(FacadeReply::Submitted(
                controller.start_dynamic_tracking()?,
            )),
            FacadeCommand::StopTracking => Ok(FacadeReply::TrackingStopped(
                controller.stop_tracking(),
            )),
            FacadeCommand::Stop => Ok(FacadeReply::Submitted(controller.stop_feeding()?)),
            FacadeCommand::Set { servo_id, angle } => Ok(FacadeReply::Submitted(
                controller.set_servo(servo_id, angle)?,
            )),
            FacadeCommand::Aim => Ok(FacadeReply::Submitted(controller.aim_at_detection()?)),
            FacadeCommand::Status => Ok(FacadeReply::Status(controller.status())),
            FacadeCommand::Help => Ok(FacadeReply::Help),
        }
    }
}
