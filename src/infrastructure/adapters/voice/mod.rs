//! Voice Adapters

mod relay_voice_gateway;

pub use relay_voice_gateway::{
    RelayFrame, RelayVoiceConnection, RelayVoiceGateway, VoiceControl, VoiceRelayEvent,
};
