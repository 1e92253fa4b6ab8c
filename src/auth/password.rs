use bcrypt::{hash, verify, BcryptError};
use log::{debug, error};

/// bcrypt 代价因子
pub const HASH_COST: u32 = 10;

/// 加盐哈希密码，同一明文两次结果不同
pub fn hash_password(password: &str) -> Result<String, BcryptError> {
    debug!("加密密码");
    hash(password, HASH_COST).map_err(|e| {
        error!("密码加密失败: {}", e);
        e
    })
}

/// 校验密码；哈希本身损坏时视为不匹配
pub fn verify_password(password: &str, hashed: &str) -> bool {
    match verify(password, hashed) {
        Ok(matched) => matched,
        Err(e) => {
            error!("密码验证过程出错: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_salted_and_verifiable() {
        let first = hash_password("hunter22").unwrap();
        let second = hash_password("hunter22").unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with("$2b$10$"));
        assert!(verify_password("hunter22", &first));
        assert!(verify_password("hunter22", &second));
    }

    #[test]
    fn wrong_password_does_not_verify() {
        let hashed = hash_password("hunter22").unwrap();
        assert!(!verify_password("hunter23", &hashed));
    }

    #[test]
    fn malformed_hash_does_not_verify() {
        assert!(!verify_password("hunter22", "not-a-bcrypt-hash"));
    }
}
