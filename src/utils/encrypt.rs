use base64::{engine::general_purpose, Engine as _};

// 计算MD5
pub fn md5_hash(data: &str) -> String {
    let digest = md5::compute(data);
    format!("{:?}", digest)
}

// base64 编码
pub fn base64_encode(data: &str) -> String {
    general_purpose::STANDARD.encode(data)
}

/// 后台接口签名：md5(base64(去掉空白的 body + 密钥))
pub fn body_signature(body: &str, secret: &str) -> String {
    let raw_data: String = format!("{body}{secret}")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    md5_hash(&base64_encode(&raw_data))
}

/// 校验后台签名，比较耗时与第几个字节不同无关
pub fn verify_body_signature(body: &str, secret: &str, signature: &str) -> bool {
    let expected = body_signature(body, secret);
    constant_time_eq(expected.as_bytes(), signature.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    // 签名长度固定，长度不同直接返回不泄露内容
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// 取 md5 前 8 字节（大端）作为种子
pub fn md5_seed(data: &str) -> u64 {
    let digest = md5::compute(data);
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&digest.0[..8]);
    u64::from_be_bytes(buf)
}
