use trinity_types::ModelTier;

/// USD per 1,000 tokens. Exact values are a contract of the spec (§4.1/§6);
/// do not "round" or otherwise adjust these without updating the spec.
struct Rate {
    input: f64,
    output: f64,
}

const fn rate_for(tier: ModelTier) -> Rate {
    match tier {
        ModelTier::Local => Rate {
            input: 0.0,
            output: 0.0,
        },
        ModelTier::CloudMini => Rate {
            input: 0.00015,
            output: 0.0006,
        },
        ModelTier::CloudStandard => Rate {
            input: 0.0025,
            output: 0.01,
        },
        ModelTier::CloudPremium => Rate {
            input: 0.005,
            output: 0.015,
        },
    }
}

/// `cost = (tokens_in/1000)*in_rate + (tokens_out/1000)*out_rate`.
pub fn calculate_cost(tier: ModelTier, tokens_in: u64, tokens_out: u64) -> f64 {
    let rate = rate_for(tier);
    (tokens_in as f64 / 1000.0) * rate.input + (tokens_out as f64 / 1000.0) * rate.output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pricing_table_matches_contract() {
        assert_eq!(calculate_cost(ModelTier::Local, 1000, 1000), 0.0);
        assert!((calculate_cost(ModelTier::CloudMini, 1000, 1000) - 0.00075).abs() < 1e-12);
        assert!((calculate_cost(ModelTier::CloudStandard, 1000, 1000) - 0.0125).abs() < 1e-12);
        assert!((calculate_cost(ModelTier::CloudPremium, 1000, 1000) - 0.02).abs() < 1e-12);
    }

    #[test]
    fn zero_tokens_cost_zero() {
        assert_eq!(calculate_cost(ModelTier::CloudPremium, 0, 0), 0.0);
    }
}
