// src/provider/avatar.rs — Deterministic generated avatars
//
// Humans get an initials avatar, agents a bot face; the same seed always
// yields the same image, so no avatar state is stored anywhere.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarVariant {
    Initials,
    BotttsNeutral,
}

impl AvatarVariant {
    fn style(&self) -> &'static str {
        match self {
            AvatarVariant::Initials => "initials",
            AvatarVariant::BotttsNeutral => "bottts-neutral",
        }
    }
}

pub fn avatar_uri(seed: &str, variant: AvatarVariant) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(seed.as_bytes()).collect();
    format!(
        "https://api.dicebear.com/9.x/{}/svg?seed={}",
        variant.style(),
        encoded
    )
}
