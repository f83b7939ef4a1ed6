//! Unit-Tests fuer Verbindungs-Manager, Router und Kanal-Verbindung

mod manager_tests;
