//! palaver-store – Bruecke zum UI-Zustandsspeicher
//!
//! Signal-Ereignisse kommen in Wire-Reihenfolge herein; die Bruecke
//! dedupliziert Chat-Nachrichten und haelt den Voice-Roster, alles andere
//! wird 1:1 an den `ZustandsSpeicher` der UI weitergereicht.

pub mod bridge;

pub use bridge::{StoreBridge, ZustandsSpeicher};
