// 记录查找键

use std::fmt;

use crate::models::SshRecord;

/// 目录查找键
///
/// 给了 `host` 时只按 host 精确匹配，忽略其余字段；
/// 否则按 `node_name` 匹配，同时给了 `address_pool` 时两者都要相等。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Lookup {
    pub node_name: Option<String>,
    pub host: Option<String>,
    pub address_pool: Option<String>,
}

impl Lookup {
    /// 按节点名查找
    pub fn node(node_name: impl Into<String>) -> Self {
        Self {
            node_name: Some(node_name.into()),
            ..Default::default()
        }
    }

    /// 按地址查找
    pub fn host(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..Default::default()
        }
    }

    /// 限定地址池
    pub fn pool(mut self, address_pool: impl Into<String>) -> Self {
        self.address_pool = Some(address_pool.into());
        self
    }

    /// 解析 `node[@pool]` 形式的目标
    pub fn parse_target(target: &str) -> Self {
        match target.split_once('@') {
            Some((node, pool)) if !pool.is_empty() => Self::node(node).pool(pool),
            _ => Self::node(target.trim_end_matches('@')),
        }
    }

    /// 判断记录是否匹配
    pub fn matches(&self, record: &SshRecord) -> bool {
        if let Some(host) = &self.host {
            return record.host == *host;
        }
        match &self.node_name {
            Some(node_name) => {
                record.node_name == *node_name
                    && self
                        .address_pool
                        .as_ref()
                        .map_or(true, |pool| record.address_pool.as_ref() == Some(pool))
            }
            None => false,
        }
    }

    /// 在记录列表中按插入顺序找第一个匹配项
    pub fn find<'a>(&self, records: &'a [SshRecord]) -> Option<&'a SshRecord> {
        records.iter().find(|record| self.matches(record))
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(node_name) = &self.node_name {
            parts.push(format!("node_name={}", node_name));
        }
        if let Some(host) = &self.host {
            parts.push(format!("host={}", host));
        }
        if let Some(address_pool) = &self.address_pool {
            parts.push(format!("address_pool={}", address_pool));
        }
        if parts.is_empty() {
            f.write_str("<empty lookup>")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}
