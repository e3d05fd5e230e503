//! 출력 버퍼링 -- 컨텍스트 승격을 위한 슬라이딩 윈도우
//!
//! [`OutputBuffer`]는 라인 방출을 지연시켜, 이후 도착하는 매칭 라인이
//! 요청하는 컨텍스트 승격(pre-context)을 이미 버퍼링된 라인에 적용할 수
//! 있게 합니다. post-context 요청은 브로드캐스트로 등록되어 이후 추가되는
//! 라인에 적용됩니다.
//!
//! # 불변 조건
//! - 라인은 항상 도착 순서대로 플러시됩니다. 승격은 심각도만 바꿉니다.
//! - 라인의 최종 심각도는 자신의 심각도와 도달한 모든 승격의 최댓값입니다
//!   (합산이나 덮어쓰기가 아님).
//! - `flush_all` 이후 버퍼링된 라인이 유실되지 않습니다.

use std::collections::VecDeque;
use std::sync::Arc;

use runpost_core::sink::OutputSink;
use runpost_core::types::Severity;

/// 버퍼링된 라인 레코드
///
/// 심각도는 플러시 전까지 승격될 수 있습니다.
#[derive(Debug)]
struct BufferedLine {
    /// 현재 부여된 심각도 (승격으로 상향될 수 있음)
    severity: Severity,
    /// 라인 내용
    text: String,
}

/// 활성 브로드캐스트 -- post-context 요청이 만든 승격 의무
///
/// 이후 추가되는 라인마다 하나씩 소진되며, 0이 되면 제거됩니다.
#[derive(Debug)]
struct Broadcast {
    /// 승격 기준 심각도 (브로드캐스트를 만든 라인의 원래 심각도)
    severity: Severity,
    /// 남은 적용 횟수
    remaining: usize,
}

/// 컨텍스트 승격 출력 버퍼
///
/// 버퍼는 최대 `pre_context_lines`개의 라인만 보유합니다.
/// 브로드캐스트는 라인 추가 시점에 적용되므로, 큐에 남은 라인의 심각도를
/// 바꿀 수 있는 것은 미래의 pre-context 승격뿐입니다. 그 범위를 벗어난
/// 가장 오래된 라인부터 도착 순서대로 싱크에 방출됩니다.
pub struct OutputBuffer {
    /// 방출 대상 싱크
    sink: Arc<dyn OutputSink>,
    /// 아직 플러시되지 않은 라인
    queue: VecDeque<BufferedLine>,
    /// 활성 브로드캐스트 목록
    broadcasts: Vec<Broadcast>,
    /// 보유할 최대 이전 라인 수 (규칙 세트의 최대 pre-context)
    pre_context_lines: usize,
    /// 규칙 세트의 최대 post-context (브로드캐스트 용량 힌트)
    post_context_lines: usize,
    /// 추가된 총 라인 수
    total_added: u64,
    /// 플러시된 총 라인 수
    total_flushed: u64,
}

impl OutputBuffer {
    /// 새 출력 버퍼를 생성합니다.
    ///
    /// 두 윈도우 파라미터는 보통 규칙 세트의
    /// `pre_context_lines()` / `post_context_lines()`에서 옵니다.
    pub fn new(
        sink: Arc<dyn OutputSink>,
        pre_context_lines: usize,
        post_context_lines: usize,
    ) -> Self {
        Self {
            sink,
            queue: VecDeque::with_capacity(pre_context_lines + post_context_lines + 1),
            broadcasts: Vec::new(),
            pre_context_lines,
            post_context_lines,
            total_added: 0,
            total_flushed: 0,
        }
    }

    /// 컨텍스트 요청 없는 일반 라인을 추가합니다.
    pub fn add_line(&mut self, severity: Severity, text: impl Into<String>) {
        self.add_line_with_context(severity, text, 0, 0);
    }

    /// 라인을 추가하고 컨텍스트 승격을 적용합니다.
    ///
    /// 1. `pre_context > 0`이면 버퍼에 남은 직전 `pre_context`개 라인의
    ///    심각도를 `max(현재, severity)`로 승격합니다.
    /// 2. 활성 브로드캐스트를 이 라인에 적용하고 각 카운트를 소진합니다.
    /// 3. 라인을 큐에 추가합니다.
    /// 4. `post_context > 0`이면 자신의 (승격 전) 심각도로 브로드캐스트를
    ///    등록합니다. 브로드캐스트는 이후 라인에만 적용됩니다.
    /// 5. pre-context 윈도우를 벗어난 라인을 도착 순서대로 플러시합니다.
    pub fn add_line_with_context(
        &mut self,
        severity: Severity,
        text: impl Into<String>,
        pre_context: usize,
        post_context: usize,
    ) {
        self.total_added += 1;

        if pre_context > 0 {
            let start = self.queue.len().saturating_sub(pre_context);
            for record in self.queue.range_mut(start..) {
                record.severity = record.severity.max(severity);
            }
        }

        let mut effective = severity;
        for broadcast in &mut self.broadcasts {
            effective = effective.max(broadcast.severity);
            broadcast.remaining -= 1;
        }
        self.broadcasts.retain(|b| b.remaining > 0);

        self.queue.push_back(BufferedLine {
            severity: effective,
            text: text.into(),
        });

        if post_context > 0 {
            self.broadcasts.push(Broadcast {
                severity,
                remaining: post_context,
            });
        }

        while self.queue.len() > self.pre_context_lines {
            self.flush_oldest();
        }
    }

    /// 남아있는 모든 라인을 도착 순서대로 플러시합니다.
    ///
    /// 스트림 종료(프로세스 종료) 시 호출하여 꼬리 라인 유실을 방지합니다.
    pub fn flush_all(&mut self) {
        while !self.queue.is_empty() {
            self.flush_oldest();
        }
        self.broadcasts.clear();
    }

    /// 가장 오래된 라인 하나를 싱크에 방출합니다.
    fn flush_oldest(&mut self) {
        if let Some(record) = self.queue.pop_front() {
            self.sink.emit(record.severity, &record.text);
            self.total_flushed += 1;
        }
    }

    /// 현재 버퍼링된 라인 수를 반환합니다.
    pub fn buffered_len(&self) -> usize {
        self.queue.len()
    }

    /// 버퍼가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// 추가된 총 라인 수를 반환합니다.
    pub fn total_added(&self) -> u64 {
        self.total_added
    }

    /// 플러시된 총 라인 수를 반환합니다.
    pub fn total_flushed(&self) -> u64 {
        self.total_flushed
    }

    /// 규칙 세트의 최대 post-context를 반환합니다.
    pub fn post_context_lines(&self) -> usize {
        self.post_context_lines
    }
}

impl std::fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputBuffer")
            .field("buffered", &self.queue.len())
            .field("broadcasts", &self.broadcasts.len())
            .field("pre_context_lines", &self.pre_context_lines)
            .field("post_context_lines", &self.post_context_lines)
            .field("total_added", &self.total_added)
            .field("total_flushed", &self.total_flushed)
            .finish()
    }
}
