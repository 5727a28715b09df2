use std::fmt;

/// One captured emission, in the order the container produced it.
#[derive(Clone, PartialEq)]
pub enum Item<S, SE> {
    State(S),
    SideEffect(SE),
}

impl<S, SE> Item<S, SE> {
    pub fn kind(&self) -> &'static str {
        match self {
            Item::State(_) => "State",
            Item::SideEffect(_) => "SideEffect",
        }
    }

    pub fn into_state(self) -> Option<S> {
        match self {
            Item::State(state) => Some(state),
            Item::SideEffect(_) => None,
        }
    }

    pub fn into_side_effect(self) -> Option<SE> {
        match self {
            Item::State(_) => None,
            Item::SideEffect(side_effect) => Some(side_effect),
        }
    }
}

impl<S: fmt::Debug, SE: fmt::Debug> fmt::Debug for Item<S, SE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::State(state) => write!(f, "State({state:?})"),
            Item::SideEffect(side_effect) => write!(f, "SideEffect({side_effect:?})"),
        }
    }
}
