//! Fixed replies for every known intent.

use crate::expression::Expression;
use crate::intent::Intent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub expression: Expression,
}

impl Reply {
    fn new(text: impl Into<String>, expression: Expression) -> Self {
        Self {
            text: text.into(),
            expression,
        }
    }
}

/// Returns the reply text and face for `intent`. Slots are interpolated.
pub fn respond(intent: &Intent) -> Reply {
    match intent {
        Intent::Stop => Reply::new("Ok, parando por agora.", Expression::HappyOpen),
        Intent::FollowPerson => Reply::new(
            "Certo, vou te acompanhar. Fique à minha frente, por favor.",
            Expression::SmileEyes,
        ),
        Intent::Navigate { room } => Reply::new(format!("Indo para a {}.", room), Expression::Wink),
        Intent::Introduce => Reply::new(
            "Eu sou um assistente de serviço. Posso conversar, seguir você e executar tarefas simples.",
            Expression::Talking,
        ),
        Intent::Joke => Reply::new(
            "Por que o robô foi ao médico? Porque ele estava com parafusos soltos!",
            Expression::SmileEyes,
        ),
        Intent::Status => Reply::new("Estou bem e pronto para ajudar!", Expression::HappyOpen),
        Intent::MakeSad => Reply::new("Sinto muito por isso. Vou tentar melhorar.", Expression::Sad),
        Intent::MakeHappy => Reply::new("Que bom ouvir isso! Obrigado!", Expression::HappyOpen),
    }
}

/// Parses `text` and looks up its reply in one go.
pub fn resolve(text: &str) -> Option<Reply> {
    crate::intent::parse_intent(text).map(|intent| respond(&intent))
}
