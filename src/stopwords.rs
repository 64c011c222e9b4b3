use std::collections::HashSet;
use std::sync::LazyLock;

/// Built-in Portuguese stopwords, plus words that carry no signal in clinical notes
/// ("paciente", "relatou", "solicitou", ...).
pub static STOPWORDS_PT: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| WORDS.iter().copied().collect());

const WORDS: &[&str] = &[
    "a", "ao", "aos", "aquela", "aquelas", "aquele", "aqueles", "aquilo", "as", "até", "com",
    "como", "da", "das", "de", "dela", "delas", "dele", "deles", "depois", "do", "dos", "e",
    "ela", "elas", "ele", "eles", "em", "entre", "essa", "essas", "esse", "esses", "esta",
    "está", "estamos", "estão", "estar", "estas", "estava", "estavam", "este", "esteja",
    "estejam", "estejamos", "estes", "esteve", "estive", "estivemos", "estiver", "estivera",
    "estiveram", "estiverem", "estivermos", "estivesse", "estivessem", "estivéssemos", "estou",
    "eu", "foi", "fomos", "for", "fora", "foram", "forem", "formos", "fosse", "fossem",
    "fôssemos", "fui", "há", "haja", "hajam", "hajamos", "hão", "havemos", "haver", "hei",
    "houve", "houvemos", "houver", "houvera", "houveram", "houverei", "houverem", "houveremos",
    "houveria", "houveriam", "houveríamos", "houvermos", "houvesse", "houvessem", "houvéssemos",
    "isso", "isto", "já", "lhe", "lhes", "mais", "mas", "me", "mesmo", "meu", "meus", "minha",
    "minhas", "muito", "na", "não", "nas", "nem", "no", "nos", "nós", "nossa", "nossas",
    "nosso", "nossos", "num", "numa", "o", "os", "ou", "para", "pela", "pelas", "pelo", "pelos",
    "por", "qual", "quando", "que", "quem", "se", "seja", "sejam", "sejamos", "sem", "ser",
    "será", "serão", "serem", "seremos", "seria", "seriam", "seríamos", "seu", "seus", "só",
    "somos", "sou", "sua", "suas", "são", "também", "te", "tem", "temos", "tenha", "tenham",
    "tenhamos", "tenho", "ter", "terá", "terão", "terem", "teremos", "teria", "teriam",
    "teríamos", "teve", "tinha", "tinham", "tínhamos", "tive", "tivemos", "tiver", "tivera",
    "tiveram", "tiverem", "tivermos", "tivesse", "tivessem", "tivéssemos", "tu", "tua", "tuas",
    "tudo", "um", "uma", "você", "vocês", "vos", "à", "às", "é", "fiz", "pra", "pos", "pós",
    "preciso", "pois", "dia", "solicitou", "porque", "realizado", "causa", "onde", "fazer",
    "meses", "após", "vezes", "ano", "dias", "indicada", "encaminhada", "então", "paciente",
    "uso", "anos", "desde", "observamos", "cerca", "nao", "data", "encaminho", "relatou",
];
