//! Persona naming rule table.
//!
//! Maps aggregate signal-flag rates to a persona template. Rule data is
//! kept separate from dispatch: [`rule_for`] walks the table top to
//! bottom and the first matching row wins. Naming is heuristic and
//! explicitly approximate, never a classification guarantee.

/// One row of the rule table. A row matches when both rates reach their
/// inclusive lower bounds.
#[derive(Debug)]
pub struct PersonaRule {
    pub min_threat_rate: f64,
    pub min_payment_rate: f64,
    pub label: &'static str,
    pub narrative: &'static str,
    pub mitigations: &'static [&'static str],
}

/// Ordered rule table, most specific first.
pub const PERSONA_RULES: &[PersonaRule] = &[
    PersonaRule {
        min_threat_rate: 0.3,
        min_payment_rate: 0.3,
        label: "Pressure-and-Pay Extortionist",
        narrative: "Combines urgent legal or account threats with immediate \
                    payment demands, typically gift cards or crypto with short deadlines.",
        mitigations: &[
            "Hold payments pending verified callback to official numbers.",
            "Alert on combined threat and payment-coercion lexicon.",
            "Block listed wallets and payment handles at the gateway.",
        ],
    },
    PersonaRule {
        min_threat_rate: 0.3,
        min_payment_rate: 0.0,
        label: "Tech-Support Impersonator",
        narrative: "Targets victims via urgent account-suspension claims and \
                    fabricated security incidents, escalating pressure to act immediately.",
        mitigations: &[
            "Hold payments pending verified callback to official numbers.",
            "Block listed domains/shorteners; alert on urgency lexicon.",
            "Template responses to stall and collect artifacts without engagement.",
        ],
    },
    PersonaRule {
        min_threat_rate: 0.0,
        min_payment_rate: 0.3,
        label: "Payment-Lure Operator",
        narrative: "Leads with prizes, refunds or jobs and steers victims \
                    toward irreversible payment rails (gift cards, wires, crypto).",
        mitigations: &[
            "Alert on gift-card and money-transfer lexicon.",
            "Quarantine messages naming wallet addresses for review.",
            "Educate on irreversible-payment red flags.",
        ],
    },
    PersonaRule {
        min_threat_rate: 0.0,
        min_payment_rate: 0.0,
        label: "Romance Impersonator",
        narrative: "Builds rapport over time with low-pressure messaging \
                    before introducing financial asks through side channels.",
        mitigations: &[
            "Flag long-running threads that pivot to financial topics.",
            "Surface shared sender infrastructure across conversations.",
            "Template responses to stall and collect artifacts without engagement.",
        ],
    },
];

/// First matching rule for the given rates. The final catch-all row
/// guarantees a match.
pub fn rule_for(threat_rate: f64, payment_rate: f64) -> &'static PersonaRule {
    PERSONA_RULES
        .iter()
        .find(|rule| {
            threat_rate >= rule.min_threat_rate && payment_rate >= rule.min_payment_rate
        })
        .unwrap_or(&PERSONA_RULES[PERSONA_RULES.len() - 1])
}
