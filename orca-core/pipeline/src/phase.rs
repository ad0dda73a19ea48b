//! 流水线阶段

use orca_descriptor::TaskKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 流水线阶段 (按执行顺序)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Phase {
    Load,
    Provision,
    Orchestrate,
    Execute,
    Report,
    Cleanup,
}

impl Phase {
    /// 规范执行顺序
    pub const ORDER: [Phase; 6] = [
        Phase::Load,
        Phase::Provision,
        Phase::Orchestrate,
        Phase::Execute,
        Phase::Report,
        Phase::Cleanup,
    ];

    /// 可以单独选择的阶段 (LOAD 总是执行)
    pub const SELECTABLE: [Phase; 5] = [
        Phase::Provision,
        Phase::Orchestrate,
        Phase::Execute,
        Phase::Report,
        Phase::Cleanup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Load => "LOAD",
            Phase::Provision => "PROVISION",
            Phase::Orchestrate => "ORCHESTRATE",
            Phase::Execute => "EXECUTE",
            Phase::Report => "REPORT",
            Phase::Cleanup => "CLEANUP",
        }
    }

    /// 阶段对应的任务类型
    pub fn task_kind(&self) -> Option<TaskKind> {
        match self {
            Phase::Orchestrate => Some(TaskKind::Orchestrate),
            Phase::Execute => Some(TaskKind::Execute),
            Phase::Report => Some(TaskKind::Report),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ORDER
            .iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| format!("未知阶段: {}", s))
    }
}

impl TryFrom<String> for Phase {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Phase> for String {
    fn from(phase: Phase) -> Self {
        phase.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("provision".parse::<Phase>().unwrap(), Phase::Provision);
        assert_eq!(" CLEANUP ".parse::<Phase>().unwrap(), Phase::Cleanup);
        assert!("deploy".parse::<Phase>().is_err());
    }

    #[test]
    fn test_order() {
        let mut phases = vec![Phase::Cleanup, Phase::Execute, Phase::Provision];
        phases.sort();
        assert_eq!(phases, vec![Phase::Provision, Phase::Execute, Phase::Cleanup]);
    }

    #[test]
    fn test_serde_uses_names() {
        let json = serde_json::to_string(&Phase::Orchestrate).unwrap();
        assert_eq!(json, "\"ORCHESTRATE\"");
        let phase: Phase = serde_json::from_str("\"report\"").unwrap();
        assert_eq!(phase, Phase::Report);
    }
}
