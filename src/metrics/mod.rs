//! # Prometheus 指标收集模块
//!
//! 为各个服务模块提供统一的 Prometheus 指标收集能力。

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// 全局指标注册表
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// 私信服务指标
pub struct MessagingMetrics {
    /// 持久化成功的消息总数
    pub messages_sent_total: IntCounter,
    /// 实时事件投递结果（event, outcome）
    pub realtime_events_total: IntCounterVec,
    /// 当前在线连接数（已注册身份）
    pub online_connections: IntGauge,
    /// 因重复注册被踢下线的连接数
    pub presence_kicks_total: IntCounter,
}

impl MessagingMetrics {
    pub fn new() -> Self {
        let messages_sent_total = IntCounter::new(
            "messaging_messages_sent_total",
            "Total number of persisted direct messages",
        )
        .expect("Failed to create messaging_messages_sent_total metric");

        let realtime_events_total = IntCounterVec::new(
            Opts::new(
                "messaging_realtime_events_total",
                "Total number of routed realtime events by outcome",
            ),
            &["event", "outcome"],
        )
        .expect("Failed to create messaging_realtime_events_total metric");

        let online_connections = IntGauge::new(
            "messaging_online_connections",
            "Number of connections currently bound to a user",
        )
        .expect("Failed to create messaging_online_connections metric");

        let presence_kicks_total = IntCounter::new(
            "messaging_presence_kicks_total",
            "Total number of connections kicked by a newer registration",
        )
        .expect("Failed to create messaging_presence_kicks_total metric");

        // 注册指标，忽略重复注册错误（测试中可能会重复创建）
        let _ = REGISTRY.register(Box::new(messages_sent_total.clone()));
        let _ = REGISTRY.register(Box::new(realtime_events_total.clone()));
        let _ = REGISTRY.register(Box::new(online_connections.clone()));
        let _ = REGISTRY.register(Box::new(presence_kicks_total.clone()));

        Self {
            messages_sent_total,
            realtime_events_total,
            online_connections,
            presence_kicks_total,
        }
    }

    /// 记录一次实时事件投递结果
    pub fn record_event(&self, event: &str, outcome: &str) {
        self.realtime_events_total
            .with_label_values(&[event, outcome])
            .inc();
    }
}

impl Default for MessagingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// 以 Prometheus 文本格式导出全局注册表
pub fn gather_text() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
