//! Audio-Senke fuer entfernte Medien-Stroeme
//!
//! Sobald ein PeerLink verbunden ist, uebergibt das Mesh den entfernten
//! Strom an die Senke; die UI-Schicht (bzw. das Playback) entscheidet
//! was damit passiert.

use palaver_core::types::TeilnehmerId;
use palaver_media::RemoteAudio;

/// Abspiel-Seite fuer entfernte Teilnehmer
pub trait AudioSenke: Send + Sync {
    /// Beginnt die Wiedergabe des Stroms dieses Teilnehmers
    fn wiedergeben(&self, teilnehmer: TeilnehmerId, audio: RemoteAudio);

    /// Beendet die Wiedergabe; No-Op wenn nichts wiedergegeben wird
    fn stoppen(&self, teilnehmer: TeilnehmerId);
}

/// Meldet Links die ausserhalb eines Praesenz-Updates sterben
/// (Transportfehler, Gegenstelle schliesst).
///
/// Der Server schickt in dem Fall nicht sofort einen neuen Roster;
/// ueber diese Senke bleibt der gemerkte Roster trotzdem konsistent.
pub trait PraesenzSenke: Send + Sync {
    /// Teilnehmer ist aus der Session weggefallen
    fn teilnehmer_weggefallen(&self, teilnehmer: TeilnehmerId);
}
