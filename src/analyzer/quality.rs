//! Composite network quality scoring and recommendations

use crate::{
    models::{QualityAssessment, QualityMetrics, QualityThresholds},
    types::Rating,
};

pub const RECOMMEND_ROUTING: &str = "优化网络路由";
pub const RECOMMEND_CONNECTION: &str = "检查网络连接";
pub const RECOMMEND_DNS: &str = "更换DNS服务器";
pub const RECOMMEND_STABILITY: &str = "检查网络稳定性";
pub const RECOMMEND_BANDWIDTH: &str = "升级网络带宽";

/// Scores metrics by deducting from 100 for every baseline they exceed
#[derive(Debug, Clone, Default)]
pub struct QualityAssessor {
    thresholds: QualityThresholds,
}

impl QualityAssessor {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    /// Score in [0, 100], rounded to two decimals
    pub fn score(&self, metrics: &QualityMetrics) -> f64 {
        let t = &self.thresholds;
        let mut deduction = 0.0;

        if let Some(latency) = usable(metrics.latency) {
            deduction += penalty(latency - t.excellent_latency_ms, t.latency_weight, t.max_latency_penalty);
        }
        if let Some(jitter) = usable(metrics.jitter) {
            deduction += penalty(jitter - t.excellent_jitter_ms, t.jitter_weight, t.max_jitter_penalty);
        }
        if let Some(loss) = usable(metrics.packet_loss) {
            deduction += penalty(loss, t.packet_loss_weight, t.max_packet_loss_penalty);
        }
        if let Some(bandwidth) = usable(metrics.bandwidth) {
            if t.min_bandwidth_mbps > 0.0 && bandwidth < t.min_bandwidth_mbps {
                let shortfall = (t.min_bandwidth_mbps - bandwidth) / t.min_bandwidth_mbps;
                deduction += penalty(shortfall, t.max_bandwidth_penalty, t.max_bandwidth_penalty);
            }
        }

        let score = (100.0 - deduction).clamp(0.0, 100.0);
        (score * 100.0).round() / 100.0
    }

    pub fn assess(&self, metrics: &QualityMetrics) -> QualityAssessment {
        let score = self.score(metrics);
        QualityAssessment {
            score,
            rating: Rating::from_score(score),
            recommendations: self.generate_recommendations(metrics),
        }
    }

    /// Canned advice for every metric past its own threshold
    pub fn generate_recommendations(&self, metrics: &QualityMetrics) -> Vec<String> {
        let t = &self.thresholds;
        let mut recommendations = Vec::new();

        if usable(metrics.latency).is_some_and(|v| v > t.recommend_latency_ms) {
            recommendations.push(RECOMMEND_ROUTING.to_string());
        }
        if usable(metrics.packet_loss).is_some_and(|v| v > t.recommend_packet_loss_percent) {
            recommendations.push(RECOMMEND_CONNECTION.to_string());
        }
        if usable(metrics.dns_time).is_some_and(|v| v > t.recommend_dns_ms) {
            recommendations.push(RECOMMEND_DNS.to_string());
        }
        if usable(metrics.jitter).is_some_and(|v| v > t.recommend_jitter_ms) {
            recommendations.push(RECOMMEND_STABILITY.to_string());
        }
        if usable(metrics.bandwidth).is_some_and(|v| v < t.min_bandwidth_mbps) {
            recommendations.push(RECOMMEND_BANDWIDTH.to_string());
        }

        recommendations
    }
}

fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}

fn penalty(excess: f64, weight: f64, max: f64) -> f64 {
    (excess * weight).clamp(0.0, max.max(0.0))
}
