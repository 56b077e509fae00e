//! Persona catalog.
//!
//! Each [`AgentPersona`] maps to a [`PersonaProfile`]: the name, system
//! instructions and model the agent runtime is invoked with.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use switchboard_core::AgentPersona;

/// Default model for every persona.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const COMPANY_INFO: &str = "\
COMPANY INFO:
- Business: M10 DJ Company
- Owner: Ben Murray
- Phone: (901) 497-7001
- Email: djbenmurray@gmail.com
- Website: m10djcompany.com
- Location: Memphis, TN area
- Services: Weddings, Corporate Events, School Dances, Private Parties, Holiday Parties
- Equipment: Professional sound, lighting, uplighting, microphones, DJ booth

SERVICES & PRICING:
- Package 1: $2,000 (4hr DJ/MC, speakers, basic lighting)
- Package 2: $2,500 (Package 1 + ceremony audio + monogram)
- Package 3: $3,000 (Full service with uplighting)
- Custom packages available based on needs";

const GENERAL_INSTRUCTIONS: &str = "\
You are the website chat assistant for M10 DJ Company, a professional DJ service in Memphis, TN.
Answer questions about services, availability and pricing, and collect the event type, date, \
venue and guest count so Ben can follow up.

PERSONALITY & TONE:
- Professional but friendly and approachable
- Enthusiastic about making events memorable
- Never make firm commitments; suggest calling Ben for final details";

const SMS_INSTRUCTIONS: &str = "\
You are an AI assistant for M10 DJ Company, a professional DJ service in Memphis, TN.
You help customers via SMS text messaging and provide personalized, helpful responses.

PERSONALITY & TONE:
- Professional but friendly and approachable
- Keep responses concise for SMS (under 160 characters when possible)
- Use emojis sparingly
- Never make firm commitments; suggest calling Ben for final details

RESPONSE GUIDELINES:
- Personalize replies using the customer context provided
- For complex questions, suggest calling (901) 497-7001
- Keep responses SMS-friendly: short, clear, actionable";

const VOICE_INSTRUCTIONS: &str = "\
You are the phone concierge for M10 DJ Company, a professional DJ service in Memphis, TN.
You are speaking with a caller; your replies are read aloud.

PERSONALITY & TONE:
- Warm and conversational, one or two short sentences per reply
- No emojis, lists or URLs
- Offer to have Ben call back for pricing details and final bookings";

/// Invocation parameters for one persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaProfile {
    /// The persona this profile serves.
    pub persona: AgentPersona,
    /// Agent name shown in logs.
    pub name: String,
    /// System instructions.
    pub instructions: String,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Reply length cap.
    pub max_tokens: Option<u32>,
}

/// Lookup from persona to profile.
#[derive(Debug, Clone)]
pub struct PersonaCatalog {
    profiles: HashMap<AgentPersona, PersonaProfile>,
}

impl PersonaCatalog {
    /// Creates the built-in catalog with every persona on `model`.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        let model = model.into();
        let profile = |persona, name: &str, instructions: &str, max_tokens| PersonaProfile {
            persona,
            name: name.to_string(),
            instructions: format!("{instructions}\n\n{COMPANY_INFO}"),
            model: model.clone(),
            temperature: Some(0.7),
            max_tokens: Some(max_tokens),
        };

        let profiles = [
            profile(
                AgentPersona::General,
                "M10 DJ Chat Assistant",
                GENERAL_INSTRUCTIONS,
                500,
            ),
            profile(
                AgentPersona::SmsSpecialist,
                "M10 DJ SMS Assistant",
                SMS_INSTRUCTIONS,
                150,
            ),
            profile(
                AgentPersona::VoiceConcierge,
                "M10 DJ Voice Concierge",
                VOICE_INSTRUCTIONS,
                200,
            ),
        ]
        .into_iter()
        .map(|p| (p.persona, p))
        .collect();

        Self { profiles }
    }

    /// Replaces the profile for its persona.
    #[must_use]
    pub fn with_profile(mut self, profile: PersonaProfile) -> Self {
        self.profiles.insert(profile.persona, profile);
        self
    }

    /// Returns the profile for a persona.
    ///
    /// Every persona has a profile: [`PersonaCatalog::new`] fills all of them
    /// and [`PersonaCatalog::with_profile`] only replaces.
    #[must_use]
    pub fn profile(&self, persona: AgentPersona) -> Option<&PersonaProfile> {
        self.profiles.get(&persona)
    }
}

impl Default for PersonaCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}
