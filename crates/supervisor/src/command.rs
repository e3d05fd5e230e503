//! 명령 감독 실행 -- 프로세스 실행, 출력 펌프, 타임아웃 감시
//!
//! [`CommandRunner`]는 외부 프로세스를 실행하고, 출력 라인을
//! [`RuleSet`]으로 분류하여 [`OutputBuffer`]로 전달하면서,
//! 두 가지 독립적인 타임아웃(출력 없음 / 총 실행 시간)을 감시합니다.
//!
//! # 내부 아키텍처
//! ```text
//! Child stdout/stderr -> reader task -> mpsc -> RuleSet.classify()
//!                                                  |
//!                                            OutputBuffer -> OutputSink
//!
//! poll tick -> idle/run timeout 체크 -> SIGTERM -> (유예) -> SIGKILL
//! ```
//!
//! 출력 펌프와 타임아웃 감시는 같은 태스크의 `select!` 루프에 한정되어
//! 있어 `start`/`last_output` 타임스탬프를 추가 동기화 없이 일관되게
//! 관찰합니다. 리더 태스크는 라인 채널로만 통신합니다.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use runpost_core::sink::{OutputSink, TracingSink};
use runpost_core::types::{CommandLine, RunReport, RunStatus, Severity, TimeoutKind};

use crate::buffer::OutputBuffer;
use crate::config::CommandConfig;
use crate::error::SupervisorError;
use crate::rule::RuleSet;

/// 출력 드레인 시 라인 하나를 기다리는 최대 시간
const DRAIN_RECV_TIMEOUT: Duration = Duration::from_millis(50);
/// 내부 라인 채널 용량
const LINE_CHANNEL_CAPACITY: usize = 1024;

/// 출력 라인의 원본 스트림
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamKind {
    Stdout,
    Stderr,
}

/// 한 번의 감독 실행 동안의 타임스탬프와 종료 상태
///
/// `run` 호출마다 하나씩 생성되고, 호출이 끝나면 폐기됩니다.
#[derive(Debug)]
pub struct RunHistory {
    /// 실행 시작 시각
    pub start: Instant,
    /// 실행 종료 시각 (프로세스 수확 후 기록)
    pub end: Option<Instant>,
    /// 프로세스 종료 코드 (시그널로 죽은 경우 None)
    pub return_code: Option<i32>,
    /// 발생한 타임아웃 종류
    pub timeout_kind: Option<TimeoutKind>,
}

/// 실행 성공/실패 판정 콜백 타입
///
/// `true`를 반환하면 실행이 실패로 판정됩니다.
pub type DetectError = dyn Fn(&RunHistory) -> bool + Send + Sync;

/// 기본 판정: 종료 코드가 정확히 0이면 성공입니다.
pub fn default_detect_error(history: &RunHistory) -> bool {
    history.return_code != Some(0)
}

/// 명령 감독 실행기
///
/// 한 번의 `run` 호출 동안 서브프로세스의 생명주기를 단독으로 소유합니다.
/// 어떤 경로로 반환하든 (성공/타임아웃/에러) 프로세스는 실행 중으로
/// 남지 않습니다.
///
/// # 사용 예시
/// ```ignore
/// use runpost_supervisor::{CommandConfigBuilder, CommandRunner};
/// use runpost_core::types::CommandLine;
///
/// let config = CommandConfigBuilder::new(CommandLine::Shell("make test".into()))
///     .idle_timeout_secs(300)
///     .build()?;
/// let mut runner = CommandRunner::builder().config(config).build()?;
/// let report = runner.run().await?;
/// ```
pub struct CommandRunner {
    /// 실행 설정
    config: CommandConfig,
    /// 라인 분류 규칙 (실행 중 읽기 전용)
    rules: Arc<RuleSet>,
    /// 분류된 라인의 최종 소비자
    sink: Arc<dyn OutputSink>,
    /// 성공/실패 판정 콜백
    detect_error: Box<DetectError>,
    /// 외부 취소 요청 토큰
    cancel_token: CancellationToken,
}

impl CommandRunner {
    /// 새 빌더를 생성합니다.
    pub fn builder() -> CommandRunnerBuilder {
        CommandRunnerBuilder::new()
    }

    /// 명령을 실행하고 완료까지 감독합니다.
    ///
    /// # Errors
    /// - [`SupervisorError::MissingWorkDir`]: cwd가 존재하지 않음 (시작 전)
    /// - [`SupervisorError::Timeout`]: 타임아웃 (프로세스 종료 후 surface)
    /// - [`SupervisorError::CommandFailed`]: 완료했지만 실패로 판정됨
    /// - [`SupervisorError::Cancelled`]: 외부 취소 요청
    pub async fn run(&mut self) -> Result<RunReport, SupervisorError> {
        let command_str = self.config.command.to_string();

        // cwd 사전 검증 -- 프로세스를 시작하기 전에 실패해야 함
        if let Some(cwd) = &self.config.cwd {
            if !cwd.is_dir() {
                return Err(SupervisorError::MissingWorkDir {
                    cwd: cwd.display().to_string(),
                    command: command_str,
                });
            }
            info!(command = %command_str, cwd = %cwd.display(), "running command");
        } else {
            info!(command = %command_str, "running command");
        }
        if matches!(self.config.command, CommandLine::Argv(_)) {
            info!("copy/paste: {command_str}");
        }
        if !self.config.env.is_empty() {
            debug!(env = ?self.config.env, "using env overrides");
        }

        let mut child = self.spawn(&command_str)?;

        let (line_tx, mut line_rx) = mpsc::channel::<(StreamKind, String)>(LINE_CHANNEL_CAPACITY);
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SupervisorError::Channel("stdout not captured".to_owned()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SupervisorError::Channel("stderr not captured".to_owned()))?;
        spawn_line_reader(stdout, StreamKind::Stdout, line_tx.clone());
        spawn_line_reader(stderr, StreamKind::Stderr, line_tx);
        // 송신측은 리더 태스크만 보유 -- 양쪽 스트림이 EOF에 도달하면 채널이 닫힘

        let mut buffer = OutputBuffer::new(
            Arc::clone(&self.sink),
            self.rules.pre_context_lines(),
            self.rules.post_context_lines(),
        );

        let start = Instant::now();
        let mut last_output = start;
        let mut history = RunHistory {
            start,
            end: None,
            return_code: None,
            timeout_kind: None,
        };

        let idle_timeout = self.config.idle_timeout_secs.map(Duration::from_secs);
        let max_runtime = self.config.max_runtime_secs.map(Duration::from_secs);
        let grace = Duration::from_secs(self.config.kill_grace_secs);

        let mut poll = tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms));
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // 출력 펌프 + 타임아웃 감시 루프
        // 양쪽 스트림이 EOF에 도달할 때까지 실행됩니다.
        loop {
            tokio::select! {
                line = line_rx.recv() => match line {
                    Some((source, text)) => {
                        last_output = Instant::now();
                        self.classify_and_buffer(&mut buffer, source, &text);
                    }
                    None => break,
                },
                _ = poll.tick() => {
                    let running = matches!(child.try_wait(), Ok(None));
                    if !running {
                        continue;
                    }
                    if let Some((kind, limit)) =
                        check_timeouts(Instant::now(), start, last_output, idle_timeout, max_runtime)
                    {
                        history.timeout_kind = Some(kind);
                        warn!(command = %command_str, %kind, "command timed out, terminating process");
                        terminate(&mut child, &command_str, grace).await;
                        self.drain_and_flush(&mut line_rx, &mut buffer).await;
                        return Err(SupervisorError::Timeout {
                            command: command_str,
                            kind,
                            elapsed_secs: start.elapsed().as_secs_f64(),
                            limit_secs: limit.as_secs(),
                        });
                    }
                },
                _ = self.cancel_token.cancelled() => {
                    warn!(command = %command_str, "cancellation requested, terminating process");
                    terminate(&mut child, &command_str, grace).await;
                    self.drain_and_flush(&mut line_rx, &mut buffer).await;
                    return Err(SupervisorError::Cancelled { command: command_str });
                }
            }
        }

        // 스트림은 닫혔지만 프로세스가 계속 살아있을 수 있으므로
        // 타임아웃 감시를 유지한 채 종료를 대기합니다.
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => return Err(SupervisorError::Io(e)),
            }
            tokio::select! {
                _ = poll.tick() => {
                    if let Some((kind, limit)) =
                        check_timeouts(Instant::now(), start, last_output, idle_timeout, max_runtime)
                    {
                        history.timeout_kind = Some(kind);
                        warn!(command = %command_str, %kind, "command timed out after closing output, terminating process");
                        terminate(&mut child, &command_str, grace).await;
                        buffer.flush_all();
                        return Err(SupervisorError::Timeout {
                            command: command_str,
                            kind,
                            elapsed_secs: start.elapsed().as_secs_f64(),
                            limit_secs: limit.as_secs(),
                        });
                    }
                },
                _ = self.cancel_token.cancelled() => {
                    warn!(command = %command_str, "cancellation requested, terminating process");
                    terminate(&mut child, &command_str, grace).await;
                    buffer.flush_all();
                    return Err(SupervisorError::Cancelled { command: command_str });
                }
            }
        };

        history.return_code = status.code();
        history.end = Some(Instant::now());
        buffer.flush_all();

        let elapsed_secs = start.elapsed().as_secs_f64();
        if (self.detect_error)(&history) {
            return Err(SupervisorError::CommandFailed {
                command: command_str,
                return_code: history.return_code,
            });
        }

        info!(
            command = %command_str,
            return_code = ?history.return_code,
            elapsed_secs,
            "command completed"
        );

        Ok(RunReport {
            return_code: history.return_code,
            status: RunStatus::Success,
            timeout_kind: None,
            elapsed_secs,
        })
    }

    /// 서브프로세스를 시작합니다.
    fn spawn(&self, command_str: &str) -> Result<Child, SupervisorError> {
        let mut cmd = match &self.config.command {
            CommandLine::Argv(argv) => {
                let (program, args) =
                    argv.split_first()
                        .ok_or_else(|| SupervisorError::Config {
                            field: "command".to_owned(),
                            reason: "command must not be empty".to_owned(),
                        })?;
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
            CommandLine::Shell(line) => shell_command(line),
        };

        if let Some(cwd) = &self.config.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }

        cmd.stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            // 감독 태스크가 중단되어도 프로세스가 남지 않게 하는 최후 수단
            .kill_on_drop(true);

        cmd.spawn().map_err(|e| SupervisorError::Spawn {
            command: command_str.to_owned(),
            reason: e.to_string(),
        })
    }

    /// 라인을 분류하여 버퍼에 추가합니다.
    ///
    /// 규칙에 매칭되지 않은 라인은 기본 심각도를 받습니다:
    /// stdout은 `info`, 분리 모드의 stderr는 `error`.
    fn classify_and_buffer(&self, buffer: &mut OutputBuffer, source: StreamKind, text: &str) {
        match self.rules.classify(text) {
            Some(class) => buffer.add_line_with_context(
                class.severity,
                text,
                class.pre_context,
                class.post_context,
            ),
            None => {
                let severity = if !self.config.merge_stderr && source == StreamKind::Stderr {
                    Severity::Error
                } else {
                    Severity::Info
                };
                buffer.add_line(severity, text);
            }
        }
    }

    /// 이미 생산된 출력을 드레인하고 버퍼를 플러시합니다.
    ///
    /// 프로세스 종료 후 호출됩니다. 리더 태스크가 EOF에 도달하면
    /// 채널이 닫히므로 무기한 대기하지 않습니다.
    async fn drain_and_flush(
        &self,
        line_rx: &mut mpsc::Receiver<(StreamKind, String)>,
        buffer: &mut OutputBuffer,
    ) {
        loop {
            match tokio::time::timeout(DRAIN_RECV_TIMEOUT, line_rx.recv()).await {
                Ok(Some((source, text))) => self.classify_and_buffer(buffer, source, &text),
                Ok(None) | Err(_) => break,
            }
        }
        buffer.flush_all();
    }
}

/// 셸 해석이 필요한 명령을 구성합니다.
#[cfg(unix)]
fn shell_command(line: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(line);
    cmd
}

#[cfg(windows)]
fn shell_command(line: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(line);
    cmd
}

/// 스트림에서 라인을 읽어 채널로 전달하는 리더 태스크를 스폰합니다.
///
/// UTF-8이 아닌 바이트는 손실 변환으로 통과시킵니다.
fn spawn_line_reader<R>(
    stream: R,
    source: StreamKind,
    tx: mpsc::Sender<(StreamKind, String)>,
) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw).await {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&raw)
                        .trim_end_matches(['\r', '\n'])
                        .to_owned();
                    if tx.send((source, text)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(?source, error = %e, "output stream read error");
                    break;
                }
            }
        }
    })
}

/// 타임아웃 조건을 검사합니다.
///
/// 출력 없음 타임아웃을 먼저 검사하고, 그 다음 총 실행 타임아웃을
/// 검사합니다. 둘 다 초과한 경우 출력 없음 타임아웃이 우선합니다.
fn check_timeouts(
    now: Instant,
    start: Instant,
    last_output: Instant,
    idle_timeout: Option<Duration>,
    max_runtime: Option<Duration>,
) -> Option<(TimeoutKind, Duration)> {
    if let Some(limit) = idle_timeout
        && now.duration_since(last_output) > limit
    {
        return Some((TimeoutKind::Idle, limit));
    }
    if let Some(limit) = max_runtime
        && now.duration_since(start) > limit
    {
        return Some((TimeoutKind::Run, limit));
    }
    None
}

/// 프로세스를 종료합니다: graceful terminate 후 유예 시간 내에
/// 종료하지 않으면 강제 종료로 격상합니다.
#[cfg(unix)]
async fn terminate(child: &mut Child, command: &str, grace: Duration) {
    if let Some(pid) = child.id() {
        // SAFETY: kill(2)에 유효한 pid와 SIGTERM을 전달
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(command = %command, ?status, "process exited after SIGTERM");
                return;
            }
            Ok(Err(e)) => {
                warn!(command = %command, error = %e, "error waiting for terminated process");
                return;
            }
            Err(_) => {
                warn!(command = %command, "process did not exit within grace period, killing");
            }
        }
    }
    if let Err(e) = child.kill().await {
        warn!(command = %command, error = %e, "failed to kill process");
    }
}

#[cfg(not(unix))]
async fn terminate(child: &mut Child, command: &str, _grace: Duration) {
    if let Err(e) = child.kill().await {
        warn!(command = %command, error = %e, "failed to kill process");
    }
}

/// 명령 감독 실행기 빌더
pub struct CommandRunnerBuilder {
    config: Option<CommandConfig>,
    rules: Arc<RuleSet>,
    sink: Option<Arc<dyn OutputSink>>,
    detect_error: Option<Box<DetectError>>,
    cancel_token: Option<CancellationToken>,
}

impl CommandRunnerBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: None,
            rules: Arc::new(RuleSet::new()),
            sink: None,
            detect_error: None,
            cancel_token: None,
        }
    }

    /// 실행 설정을 지정합니다 (필수).
    pub fn config(mut self, config: CommandConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 라인 분류 규칙을 지정합니다. 기본값은 빈 규칙 세트입니다.
    pub fn rules(mut self, rules: Arc<RuleSet>) -> Self {
        self.rules = rules;
        self
    }

    /// 출력 싱크를 지정합니다. 기본값은 [`TracingSink`]입니다.
    pub fn sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 성공/실패 판정 콜백을 지정합니다.
    ///
    /// 기본값은 종료 코드가 정확히 0일 때만 성공으로 판정합니다.
    pub fn detect_error(
        mut self,
        f: impl Fn(&RunHistory) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.detect_error = Some(Box::new(f));
        self
    }

    /// 외부 취소 토큰을 지정합니다.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// 설정을 검증하고 실행기를 생성합니다.
    pub fn build(self) -> Result<CommandRunner, SupervisorError> {
        let config = self.config.ok_or_else(|| SupervisorError::Config {
            field: "command".to_owned(),
            reason: "command config is required".to_owned(),
        })?;
        config.validate()?;

        Ok(CommandRunner {
            config,
            rules: self.rules,
            sink: self.sink.unwrap_or_else(|| Arc::new(TracingSink::new())),
            detect_error: self
                .detect_error
                .unwrap_or_else(|| Box::new(default_detect_error)),
            cancel_token: self.cancel_token.unwrap_or_default(),
        })
    }
}

impl Default for CommandRunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommandConfigBuilder;

    fn argv(parts: &[&str]) -> CommandLine {
        CommandLine::Argv(parts.iter().map(|s| (*s).to_owned()).collect())
    }

    #[test]
    fn builder_requires_config() {
        let result = CommandRunner::builder().build();
        assert!(matches!(result, Err(SupervisorError::Config { .. })));
    }

    #[test]
    fn default_detect_error_success_iff_zero() {
        let mut history = RunHistory {
            start: Instant::now(),
            end: None,
            return_code: Some(0),
            timeout_kind: None,
        };
        assert!(!default_detect_error(&history));

        history.return_code = Some(1);
        assert!(default_detect_error(&history));

        history.return_code = None;
        assert!(default_detect_error(&history));
    }

    #[test]
    fn check_timeouts_idle_takes_precedence() {
        let start = Instant::now();
        let last_output = start + Duration::from_secs(50);
        let now = start + Duration::from_secs(100);
        let result = check_timeouts(
            now,
            start,
            last_output,
            Some(Duration::from_secs(10)),
            Some(Duration::from_secs(20)),
        );
        assert!(matches!(result, Some((TimeoutKind::Idle, _))));
    }

    #[test]
    fn check_timeouts_run_fires_despite_recent_output() {
        let start = Instant::now();
        let now = start + Duration::from_secs(100);
        let last_output = now;
        let result = check_timeouts(
            now,
            start,
            last_output,
            Some(Duration::from_secs(10)),
            Some(Duration::from_secs(20)),
        );
        assert!(matches!(result, Some((TimeoutKind::Run, _))));
    }

    #[test]
    fn check_timeouts_none_when_within_limits() {
        let now = Instant::now();
        let result = check_timeouts(
            now,
            now,
            now,
            Some(Duration::from_secs(10)),
            Some(Duration::from_secs(20)),
        );
        assert!(result.is_none());
    }

    #[test]
    fn check_timeouts_none_when_unconfigured() {
        let start = Instant::now();
        let now = start + Duration::from_secs(1000);
        assert!(check_timeouts(now, start, start, None, None).is_none());
    }

    #[tokio::test]
    async fn missing_cwd_fails_before_spawn() {
        let config = CommandConfigBuilder::new(argv(&["echo", "hi"]))
            .cwd("/nonexistent/runpost/dir")
            .build()
            .unwrap();
        let mut runner = CommandRunner::builder().config(config).build().unwrap();
        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, SupervisorError::MissingWorkDir { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_command_reports_success() {
        let config = CommandConfigBuilder::new(argv(&["echo", "hello"]))
            .build()
            .unwrap();
        let mut runner = CommandRunner::builder().config(config).build().unwrap();
        let report = runner.run().await.unwrap();
        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(report.return_code, Some(0));
        assert!(report.timeout_kind.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_raises_command_failed() {
        let config = CommandConfigBuilder::new(CommandLine::Shell("exit 1".to_owned()))
            .build()
            .unwrap();
        let mut runner = CommandRunner::builder().config(config).build().unwrap();
        let err = runner.run().await.unwrap_err();
        assert!(matches!(
            err,
            SupervisorError::CommandFailed {
                return_code: Some(1),
                ..
            }
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn custom_detect_error_overrides_default() {
        let config = CommandConfigBuilder::new(CommandLine::Shell("exit 3".to_owned()))
            .build()
            .unwrap();
        let mut runner = CommandRunner::builder()
            .config(config)
            .detect_error(|history| !matches!(history.return_code, Some(0) | Some(3)))
            .build()
            .unwrap();
        let report = runner.run().await.unwrap();
        assert_eq!(report.return_code, Some(3));
        assert_eq!(report.status, RunStatus::Success);
    }

    #[tokio::test]
    async fn spawn_failure_surfaces_spawn_error() {
        let config = CommandConfigBuilder::new(argv(&["/nonexistent/runpost-binary"]))
            .build()
            .unwrap();
        let mut runner = CommandRunner::builder().config(config).build().unwrap();
        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, SupervisorError::Spawn { .. }));
    }
}
