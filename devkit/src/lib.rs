/*!
# AgroDash DevKit - Stubs et utilitaires pour les tests

Bibliothèque facilitant les tests du dashboard sans broker réel :
- Stub TCP du broker capteurs (réponses scriptées, requêtes enregistrées)
- Builders de lignes du protocole JSON délimité par `\n`
- Init des logs pour les tests
*/

pub mod broker_stub;
pub mod messages;
pub mod test_utils;

pub use broker_stub::{BrokerStub, Frame, StubScript};
pub use messages::{WireMessage, WireMessageBuilder};
pub use test_utils::init_test_logging;
