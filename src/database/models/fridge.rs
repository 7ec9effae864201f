use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Temperature range a vaccine fridge must stay within (normally 2.0 to 8.0 °C)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Fridge {
    pub id: Uuid,
    pub practice_id: Uuid,
    pub name: String,
    pub min_temp: Decimal,
    pub max_temp: Decimal,
    pub is_active: bool,
}

impl Fridge {
    pub fn in_range(&self, reading: Decimal) -> bool {
        reading >= self.min_temp && reading <= self.max_temp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn range_is_inclusive() {
        let fridge = Fridge {
            id: Uuid::new_v4(),
            practice_id: Uuid::new_v4(),
            name: "Vaccine fridge".into(),
            min_temp: Decimal::from_str("2.0").unwrap(),
            max_temp: Decimal::from_str("8.0").unwrap(),
            is_active: true,
        };
        assert!(fridge.in_range(Decimal::from_str("2.0").unwrap()));
        assert!(fridge.in_range(Decimal::from_str("8.0").unwrap()));
        assert!(!fridge.in_range(Decimal::from_str("8.1").unwrap()));
        assert!(!fridge.in_range(Decimal::from_str("1.9").unwrap()));
    }
}
