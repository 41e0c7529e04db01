use std::collections::HashSet;

use tokio::sync::RwLock;

use shared::config::normalize_phone;

/// Gate in front of the wizard: operator ids seeded from config plus
/// runtime grants earned through the contact sub-flow.
pub struct AccessControl {
    operators: RwLock<HashSet<i64>>,
    phones: HashSet<String>,
}

impl AccessControl {
    /// `phones` must already be digits-only (see
    /// [`shared::config::normalize_phone`]).
    pub fn new(operators: HashSet<i64>, phones: HashSet<String>) -> Self {
        Self {
            operators: RwLock::new(operators),
            phones,
        }
    }

    pub async fn is_authorized(&self, user_id: i64) -> bool {
        self.operators.read().await.contains(&user_id)
    }

    pub fn is_authorized_phone(&self, phone: &str) -> bool {
        self.phones.contains(&normalize_phone(phone))
    }

    pub async fn grant(&self, user_id: i64) {
        self.operators.write().await.insert(user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn grants_persist_for_the_process_lifetime() {
        let access = AccessControl::new(
            HashSet::from([100]),
            HashSet::from(["79012345678".to_string()]),
        );

        assert!(access.is_authorized(100).await);
        assert!(!access.is_authorized(200).await);

        assert!(access.is_authorized_phone("+7 901 234-56-78"));
        assert!(!access.is_authorized_phone("+1 555 000 0000"));

        access.grant(200).await;
        assert!(access.is_authorized(200).await);
    }
}
