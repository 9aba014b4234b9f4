//! Topic 路由匹配
//!
//! 实现 AMQP topic 交换机的绑定模式语义：routing key 和模式均按 `.` 切分为段，
//! `*` 恰好匹配一段，`#` 匹配零到多段，其余段需逐字相等。

/// 判断 routing key 是否匹配绑定模式
pub fn matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    match_segments(&pattern, &key)
}

fn match_segments(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => {
            // 连续的 # 等价于单个 #
            if rest.first() == Some(&"#") {
                return match_segments(rest, key);
            }
            (0..=key.len()).any(|skip| match_segments(rest, &key[skip..]))
        }
        Some((&"*", rest)) => !key.is_empty() && match_segments(rest, &key[1..]),
        Some((segment, rest)) => key
            .split_first()
            .is_some_and(|(head, tail)| head == segment && match_segments(rest, tail)),
    }
}
