//! REPL 模式（交互式 Shell）
//!
//! 专用输入线程 + crossbeam 通道：保留历史记录，不阻塞 tokio。
//! 动作指令提交后立即返回，结果由后台线程在完成时打印。

use anyhow::Result;
use crossbeam_channel::{Receiver, bounded};
use feeder_sdk::{FacadeReply, HELP, OperationHandle};
use rustyline::Editor;
use std::thread;

use super::session::{Session, SessionOptions, print_report};
use crate::validation::parse_target;

/// 输入线程转发 Ctrl+C 时使用的标记
const SIGINT: &str = "SIGINT";

/// REPL 输入（专用输入线程）
pub struct ReplInput {
    command_rx: Receiver<String>,
    _input_thread: thread::JoinHandle<Result<()>>,
}

impl ReplInput {
    /// 创建专用输入线程（保留历史记录）
    pub fn new() -> Self {
        let (command_tx, command_rx) = bounded::<String>(10);

        // Editor 在专用线程内创建，生命周期 = REPL 会话
        let input_thread = thread::spawn(move || {
            use rustyline::history::DefaultHistory;

            let mut rl = Editor::<(), DefaultHistory>::new()
                .map_err(|e| anyhow::anyhow!("Failed to initialize readline: {}", e))?;

            let history_path = ".feeder_history";
            rl.load_history(history_path).ok(); // 首次运行没有历史文件

            println!("Feeder CLI v{} - 交互式 Shell", env!("CARGO_PKG_VERSION"));
            println!("输入 'help' 查看帮助，'exit' 退出");
            println!();

            loop {
                match rl.readline("feeder> ") {
                    Ok(line) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }

                        if line == "exit" || line == "quit" {
                            rl.save_history(history_path).ok();
                            let _ = command_tx.send(line);
                            break;
                        }

                        let _ = rl.add_history_entry(line.clone());
                        if command_tx.send(line).is_err() {
                            break; // 主线程已关闭
                        }
                    },

                    Err(rustyline::error::ReadlineError::Interrupted) => {
                        // Ctrl+C：在主线程处理停止
                        println!("^C");
                        let _ = command_tx.send(SIGINT.to_string());
                    },

                    Err(rustyline::error::ReadlineError::Eof) => {
                        // Ctrl+D：退出
                        rl.save_history(history_path).ok();
                        let _ = command_tx.send("exit".to_string());
                        break;
                    },

                    Err(err) => {
                        eprintln!("Error: {:?}", err);
                        break;
                    },
                }
            }

            Ok(())
        });

        Self {
            command_rx,
            _input_thread: input_thread,
        }
    }

    /// 等待用户输入（crossbeam recv 放到阻塞线程池）
    pub async fn recv_command(&self) -> Option<String> {
        let rx = self.command_rx.clone();
        tokio::task::spawn_blocking(move || rx.recv())
            .await
            .ok()
            .and_then(|result| result.ok())
    }
}

/// 运行 REPL 模式
pub async fn run_repl(options: SessionOptions, auto_init: bool) -> Result<()> {
    let mut session = Session::open(&options)?;
    let auto_init = auto_init && session.cli_config.auto_init.unwrap_or(true);
    session.set_auto_init(auto_init);
    let input = ReplInput::new();

    println!();
    if options.simulate {
        println!("💡 模拟模式：'connect' 连接到模拟下位机，'target X,Y' 移动合成目标");
    } else {
        println!("💡 提示: 使用 'connect' 连接到 {}", session.port());
    }
    println!();

    loop {
        tokio::select! {
            // 优先级1：用户输入
            line = input.recv_command() => {
                let Some(line) = line else {
                    break; // 输入线程已退出
                };

                match line.as_str() {
                    "exit" | "quit" => {
                        println!("👋 再见！");
                        break;
                    },

                    SIGINT => emergency_stop(&session),

                    "help" => print_help(),

                    _ => {
                        if let Err(err) = handle_command(&line, &session) {
                            eprintln!("❌ Error: {}", err);
                            print_help_hint(&line);
                        }
                    },
                }
            },

            // 优先级2：Ctrl+C（输入线程未捕获时）
            _ = tokio::signal::ctrl_c() => {
                emergency_stop(&session);
                break;
            },
        }
    }

    println!("⏳ 清理...");
    session.controller.cleanup();
    Ok(())
}

/// 处理一行指令
fn handle_command(line: &str, session: &Session) -> Result<()> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    match parts.as_slice() {
        ["target"] => match session.target.get() {
            Some((x, y)) => println!("🎯 目标: ({}, {})", x, y),
            None => println!("🎯 目标: 无"),
        },

        ["target", "none"] => {
            session.target.set(None);
            println!("✅ 已移除合成目标");
        },

        ["target", coords] => {
            let target = parse_target(coords)?;
            session.target.set(Some(target));
            println!("✅ 合成目标: ({}, {})", target.0, target.1);
        },

        ["connect", rest @ ..] => {
            let port = rest.first().copied();
            let baud = rest.get(1).map(|b| b.parse::<u32>()).transpose()?;
            report(session.connect(port, baud)?);
        },

        _ => {
            if let Some(reply) = session.facade.execute(line)? {
                report(reply);
            }
        },
    }

    Ok(())
}

/// 打印指令结果；异步操作在后台等待并打印
fn report(reply: FacadeReply) {
    match reply {
        FacadeReply::Submitted(handle) => {
            println!("⏳ {}", handle.operation());
            spawn_result_printer(handle);
        },
        FacadeReply::Connected { port, init } => {
            println!("✅ 已连接 {}", port);
            if let Some(handle) = init {
                println!("⏳ {}", handle.operation());
                spawn_result_printer(handle);
            }
        },
        other => println!("{}", other),
    }
}

fn spawn_result_printer(handle: OperationHandle) {
    let operation = handle.operation();
    thread::spawn(move || match handle.wait() {
        Ok(report) => print_report(&report),
        Err(err) => eprintln!("❌ {} 失败: {}", operation, err),
    });
}

/// Ctrl+C：停止喂食并复位
fn emergency_stop(session: &Session) {
    eprintln!("\n🛑 停止喂食...");
    if !session.controller.is_connected() {
        return;
    }
    match session.controller.stop_feeding() {
        Ok(handle) => spawn_result_printer(handle),
        Err(err) => eprintln!("❌ 停止失败: {}", err),
    }
}

/// 打印帮助信息
fn print_help() {
    println!("{}", HELP);
    println!("  target [X,Y|none]       show or move the synthetic mouth target");
    println!("  exit                    quit the shell");
}

/// 打印错误提示
fn print_help_hint(line: &str) {
    let command = line.split_whitespace().next().unwrap_or_default();
    println!("💡 输入 'help' 查看 '{}' 的用法", command);
}
